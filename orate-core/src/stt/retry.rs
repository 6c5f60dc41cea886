//! Bounded exponential-backoff retry around one STT provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::config::RetryConfig;
use crate::diagnostics::{self, DiagnosticsEvent, DiagnosticsSink};
use crate::error::SttError;
use crate::provider::{AudioAsset, SttProvider};

/// Retries transient failures (`network`, `throttled`, `unknown`) with
/// exponential backoff plus uniform jitter. Permanent failures (`auth`,
/// `invalid_audio`, `quota_exceeded`, `session_limit`) propagate
/// immediately; on exhaustion the last error is re-raised.
pub struct RetryingStt {
    inner: Arc<dyn SttProvider>,
    name: String,
    config: RetryConfig,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl RetryingStt {
    pub fn new(
        inner: Arc<dyn SttProvider>,
        name: impl Into<String>,
        config: RetryConfig,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            inner,
            name: name.into(),
            config,
            diagnostics,
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay;
        let jitter = base.mul_f64(rand::thread_rng().gen_range(0.0..=1.0));
        base.saturating_mul(1 << attempt.min(16)) + jitter
    }
}

#[async_trait]
impl SttProvider for RetryingStt {
    async fn transcribe(&self, asset: &AudioAsset) -> Result<String, SttError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.transcribe(asset).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        if attempt > 0 {
                            warn!(
                                provider = %self.name,
                                retries = attempt,
                                "stt failed after retries: {err}"
                            );
                        }
                        return Err(err);
                    }

                    let delay = self.backoff_delay(attempt);
                    attempt += 1;
                    warn!(
                        provider = %self.name,
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "stt retry: {err}"
                    );
                    diagnostics::emit(
                        &self.diagnostics,
                        DiagnosticsEvent::new("stt_retry")
                            .with("provider", self.name.as_str())
                            .with("attempt", attempt)
                            .with("max_retries", self.config.max_retries)
                            .with("delay_ms", delay.as_millis() as u64)
                            .with("error", err.to_string()),
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
