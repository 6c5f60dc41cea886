//! Process-wide admission bound on simultaneous STT calls.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::error::SttError;
use crate::provider::{AudioAsset, SttProvider};

/// Counting-semaphore gate around the fully composed chain. Callers beyond
/// `max_concurrent` wait for a slot; tokio's semaphore admits waiters in
/// FIFO order. The permit is held for the duration of the underlying call
/// and released on every exit path — success, error, or cancellation —
/// because it is an RAII guard.
pub struct ConcurrencyLimitedStt {
    inner: Arc<dyn SttProvider>,
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimitedStt {
    pub fn new(inner: Arc<dyn SttProvider>, max_concurrent: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Slots currently free (observability only).
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl SttProvider for ConcurrencyLimitedStt {
    async fn transcribe(&self, asset: &AudioAsset) -> Result<String, SttError> {
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SttError::Unknown("stt limiter closed".into()))?;
        self.inner.transcribe(asset).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::AudioFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct GaugedStt {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SttProvider for GaugedStt {
        async fn transcribe(&self, _asset: &AudioAsset) -> Result<String, SttError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("ok".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn peak_concurrency_never_exceeds_limit() {
        let gauged = Arc::new(GaugedStt {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let limited = Arc::new(ConcurrencyLimitedStt::new(gauged.clone(), 2));

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let limited = Arc::clone(&limited);
            tasks.push(tokio::spawn(async move {
                let asset = AudioAsset::from_bytes(AudioFormat::Caf, vec![0u8; 4]);
                limited.transcribe(&asset).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(gauged.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limited.available_slots(), 2);
    }

    #[tokio::test]
    async fn slot_released_on_error() {
        struct FailingStt;

        #[async_trait]
        impl SttProvider for FailingStt {
            async fn transcribe(&self, _asset: &AudioAsset) -> Result<String, SttError> {
                Err(SttError::Auth)
            }
        }

        let limited = ConcurrencyLimitedStt::new(Arc::new(FailingStt), 1);
        let asset = AudioAsset::from_bytes(AudioFormat::Caf, vec![0u8; 4]);
        for _ in 0..3 {
            assert!(limited.transcribe(&asset).await.is_err());
        }
        assert_eq!(limited.available_slots(), 1);
    }
}
