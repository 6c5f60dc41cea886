use thiserror::Error;

/// Failure modes of a speech-to-text provider call.
///
/// Only `Network`, `Throttled` and `Unknown` are worth retrying; the rest
/// will not resolve by hitting the same provider again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SttError {
    #[error("authentication rejected")]
    Auth,

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("throttled by provider")]
    Throttled,

    #[error("concurrent session limit reached")]
    SessionLimit,

    #[error("audio rejected as invalid")]
    InvalidAudio,

    #[error("network error: {0}")]
    Network(String),

    #[error("unknown provider error: {0}")]
    Unknown(String),
}

impl SttError {
    /// Whether another attempt against the same provider can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SttError::Network(_) | SttError::Throttled | SttError::Unknown(_)
        )
    }
}

/// Failure modes of a rewrite provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("authentication rejected")]
    Auth,

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("throttled by provider")]
    Throttled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("provider-side timeout")]
    Timeout,

    #[error("unknown provider error: {0}")]
    Unknown(String),
}

impl RewriteError {
    /// Coarse single-token summary for diagnostics fields. Keeps free-form
    /// provider text out of release logs except where the variant carries it.
    pub fn summary(&self) -> String {
        match self {
            RewriteError::Auth => "auth".into(),
            RewriteError::QuotaExceeded => "quota_exceeded".into(),
            RewriteError::Throttled => "throttled".into(),
            RewriteError::InvalidRequest(msg) => format!("invalid_request({msg})"),
            RewriteError::Network(msg) => format!("network({msg})"),
            RewriteError::Timeout => "provider_timeout".into(),
            RewriteError::Unknown(msg) => format!("unknown({msg})"),
        }
    }
}

/// Failure modes of the external paste capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasteError {
    #[error("paste permission denied: {0}")]
    PermissionDenied(String),

    #[error("paste failed: {0}")]
    Failed(String),
}

/// Failure of the optional audio transcode stage. Always non-fatal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("audio conversion failed: {0}")]
pub struct ConvertError(pub String);

/// Errors surfaced by the pipeline orchestrator.
///
/// Rewrite-stage failures never appear here — they degrade to the raw
/// transcript inside the pipeline. Only the STT stage and the paste
/// capability can fail a request outright.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// STT produced nothing usable (empty after trimming).
    #[error("no transcript produced")]
    NoTranscript,

    /// The full STT chain was exhausted.
    #[error("transcription failed: {0}")]
    Stt(#[from] SttError),

    #[error(transparent)]
    Paste(#[from] PasteError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_stt_errors_are_retryable() {
        assert!(SttError::Network("reset".into()).is_retryable());
        assert!(SttError::Throttled.is_retryable());
        assert!(SttError::Unknown("503".into()).is_retryable());

        assert!(!SttError::Auth.is_retryable());
        assert!(!SttError::QuotaExceeded.is_retryable());
        assert!(!SttError::SessionLimit.is_retryable());
        assert!(!SttError::InvalidAudio.is_retryable());
    }

    #[test]
    fn rewrite_error_summary_is_single_token_for_payload_free_variants() {
        assert_eq!(RewriteError::Auth.summary(), "auth");
        assert_eq!(RewriteError::Timeout.summary(), "provider_timeout");
        assert_eq!(
            RewriteError::Network("dns".into()).summary(),
            "network(dns)"
        );
    }
}
