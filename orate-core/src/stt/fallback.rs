//! Pairwise STT fallback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::diagnostics::{self, DiagnosticsEvent, DiagnosticsSink};
use crate::error::SttError;
use crate::provider::{AudioAsset, SttProvider};

/// Tries `primary`; any primary failure triggers one full attempt on
/// `secondary`. Both sides are expected to already be retry-wrapped.
/// N providers compose by left-folding pairs (see `assembly`).
pub struct FallbackStt {
    primary: Arc<dyn SttProvider>,
    secondary: Arc<dyn SttProvider>,
    primary_name: String,
    secondary_name: String,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl FallbackStt {
    pub fn new(
        primary: Arc<dyn SttProvider>,
        primary_name: impl Into<String>,
        secondary: Arc<dyn SttProvider>,
        secondary_name: impl Into<String>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            primary,
            secondary,
            primary_name: primary_name.into(),
            secondary_name: secondary_name.into(),
            diagnostics,
        }
    }

    /// Identity of the composed unit for diagnostics.
    pub fn label(&self) -> String {
        format!("{} + {}", self.primary_name, self.secondary_name)
    }
}

#[async_trait]
impl SttProvider for FallbackStt {
    async fn transcribe(&self, asset: &AudioAsset) -> Result<String, SttError> {
        match self.primary.transcribe(asset).await {
            Ok(text) => Ok(text),
            Err(err) => {
                warn!(
                    from = %self.primary_name,
                    to = %self.secondary_name,
                    "stt fallback: {err}"
                );
                diagnostics::emit(
                    &self.diagnostics,
                    DiagnosticsEvent::new("stt_fallback")
                        .with("from", self.primary_name.as_str())
                        .with("to", self.secondary_name.as_str())
                        .with("error", err.to_string()),
                );
                self.secondary.transcribe(asset).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullSink;
    use crate::provider::AudioFormat;

    struct FixedStt(Result<String, SttError>);

    #[async_trait]
    impl SttProvider for FixedStt {
        async fn transcribe(&self, _asset: &AudioAsset) -> Result<String, SttError> {
            self.0.clone()
        }
    }

    fn asset() -> AudioAsset {
        AudioAsset::from_bytes(AudioFormat::Wav, vec![0u8; 8])
    }

    #[tokio::test]
    async fn any_primary_failure_triggers_secondary() {
        for error in [
            SttError::Auth,
            SttError::Network("down".into()),
            SttError::InvalidAudio,
        ] {
            let fallback = FallbackStt::new(
                Arc::new(FixedStt(Err(error))),
                "a",
                Arc::new(FixedStt(Ok("from b".into()))),
                "b",
                Arc::new(NullSink),
            );
            assert_eq!(fallback.transcribe(&asset()).await.unwrap(), "from b");
        }
    }

    #[tokio::test]
    async fn secondary_error_surfaces_when_both_fail() {
        let fallback = FallbackStt::new(
            Arc::new(FixedStt(Err(SttError::Throttled))),
            "a",
            Arc::new(FixedStt(Err(SttError::QuotaExceeded))),
            "b",
            Arc::new(NullSink),
        );
        let err = fallback.transcribe(&asset()).await.unwrap_err();
        assert_eq!(err, SttError::QuotaExceeded);
    }

    #[tokio::test]
    async fn primary_success_never_touches_secondary() {
        struct Unreachable;

        #[async_trait]
        impl SttProvider for Unreachable {
            async fn transcribe(&self, _asset: &AudioAsset) -> Result<String, SttError> {
                panic!("secondary must not be called");
            }
        }

        let fallback = FallbackStt::new(
            Arc::new(FixedStt(Ok("from a".into()))),
            "a",
            Arc::new(Unreachable),
            "b",
            Arc::new(NullSink),
        );
        assert_eq!(fallback.transcribe(&asset()).await.unwrap(), "from a");
        assert_eq!(fallback.label(), "a + b");
    }
}
