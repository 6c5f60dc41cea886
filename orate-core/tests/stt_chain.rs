//! End-to-end behavior of a composed STT chain: retry, fallback, and the
//! process-wide concurrency limit working together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orate_core::config::{ChainConfig, RetryConfig};
use orate_core::diagnostics::NullSink;
use orate_core::error::SttError;
use orate_core::provider::{AudioAsset, AudioFormat, SttProvider};
use orate_core::stt::{compose_chain, ChainEntry};

struct FlakyStt {
    calls: AtomicUsize,
    /// Calls that fail (with a retryable error) before the first success.
    failures_before_success: usize,
    transcript: &'static str,
}

impl FlakyStt {
    fn new(failures_before_success: usize, transcript: &'static str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures_before_success,
            transcript,
        })
    }
}

#[async_trait]
impl SttProvider for FlakyStt {
    async fn transcribe(&self, _asset: &AudioAsset) -> Result<String, SttError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures_before_success {
            Err(SttError::Network("connection reset".into()))
        } else {
            Ok(self.transcript.to_string())
        }
    }
}

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

fn entry(id: &str, provider: Arc<dyn SttProvider>, max_retries: u32) -> ChainEntry {
    ChainEntry {
        id: id.into(),
        display_name: id.to_uppercase(),
        model: "scribe-1".into(),
        provider,
        retry: RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(500),
        },
    }
}

fn asset() -> AudioAsset {
    AudioAsset::from_bytes(AudioFormat::Caf, vec![0u8; 16])
}

#[tokio::test(start_paused = true)]
async fn exhausted_primary_falls_back_to_secondary() {
    let primary = FlakyStt::new(usize::MAX, "never");
    let secondary = FlakyStt::new(0, "from secondary");

    let mut config = ChainConfig::default();
    config.normalize();
    let chain = compose_chain(
        vec![
            entry("primary", primary.clone(), 3),
            entry("secondary", secondary.clone(), 2),
        ],
        &config,
        Arc::new(NullSink),
    )
    .unwrap();

    let transcript = chain.provider.transcribe(&asset()).await.unwrap();
    assert_eq!(transcript, "from secondary");
    // Initial attempt plus max_retries, then the secondary exactly once.
    assert_eq!(primary.calls.load(Ordering::SeqCst), 4);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn primary_recovers_mid_retry_without_touching_secondary() {
    let primary = FlakyStt::new(2, "from primary");
    let secondary = FlakyStt::new(0, "from secondary");

    let mut config = ChainConfig::default();
    config.normalize();
    let chain = compose_chain(
        vec![
            entry("primary", primary.clone(), 3),
            entry("secondary", secondary.clone(), 2),
        ],
        &config,
        Arc::new(NullSink),
    )
    .unwrap();

    let transcript = chain.provider.transcribe(&asset()).await.unwrap();
    assert_eq!(transcript, "from primary");
    assert_eq!(primary.calls.load(Ordering::SeqCst), 3);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn chain_enforces_the_concurrency_limit() {
    let gauged = Arc::new(GaugedStt {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });

    let config = ChainConfig {
        max_concurrent: 2,
        forced_provider: None,
    };
    let chain = compose_chain(
        vec![entry("only", gauged.clone(), 0)],
        &config,
        Arc::new(NullSink),
    )
    .unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let provider = Arc::clone(&chain.provider);
        handles.push(tokio::spawn(async move {
            provider.transcribe(&asset()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(gauged.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(gauged.in_flight.load(Ordering::SeqCst), 0);
}
