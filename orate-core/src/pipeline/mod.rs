//! `DictationPipeline` — top-level request orchestrator.
//!
//! ## Stages
//!
//! ```text
//! AudioAsset
//!     └─► encode    (optional transcode; any failure falls back to original)
//!         └─► stt       (composed chain, hard pipeline deadline)
//!             └─► rewrite   (supervised; degrades to raw transcript)
//!                 └─► paste
//! ```
//!
//! Stage timings are recorded on every path, including failures — a request
//! that dies in the STT stage still reports how long encode and STT took,
//! with the later stages zeroed.

pub mod supervisor;

pub use supervisor::{RewriteOutcome, RewriteStage, StageResult};

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::diagnostics::{self, DiagnosticsEvent, DiagnosticsSink, NullSink};
use crate::error::{PipelineError, Result, SttError};
use crate::level::ProcessingLevel;
use crate::provider::{
    AudioAsset, AudioConverter, PreferencesReader, RewriteProvider, SttProvider, TextPaster,
};
use crate::rewrite::RewriteCache;

/// Per-stage wall-clock timings for one request.
#[derive(Debug, Clone)]
pub struct PipelineTiming {
    /// Level the request ran at. `None` when it failed before the level
    /// was consulted.
    pub level: Option<ProcessingLevel>,
    pub encode: Duration,
    pub stt: Duration,
    pub rewrite: Duration,
    pub paste: Duration,
    pub original_size_bytes: u64,
    pub encoded_size_bytes: u64,
    pub rewrite_outcome: Option<RewriteOutcome>,
    pub started: SystemTime,
}

impl PipelineTiming {
    fn new(original_size_bytes: u64) -> Self {
        Self {
            level: None,
            encode: Duration::ZERO,
            stt: Duration::ZERO,
            rewrite: Duration::ZERO,
            paste: Duration::ZERO,
            original_size_bytes,
            encoded_size_bytes: original_size_bytes,
            rewrite_outcome: None,
            started: SystemTime::now(),
        }
    }

    pub fn total(&self) -> Duration {
        self.encode + self.stt + self.rewrite + self.paste
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "total={}ms encode={}ms stt={}ms rewrite={}ms paste={}ms level={} outcome={}",
            self.total().as_millis(),
            self.encode.as_millis(),
            self.stt.as_millis(),
            self.rewrite.as_millis(),
            self.paste.as_millis(),
            self.level.map(|l| l.as_str()).unwrap_or("-"),
            self.rewrite_outcome.map(|o| o.as_str()).unwrap_or("-"),
        )
    }
}

/// Invoked once per request with the final timings, success or not.
pub type TimingHandler = Arc<dyn Fn(&PipelineTiming) + Send + Sync>;

/// Collaborators the pipeline drives. Hosts build one of these at startup;
/// tests plug in fakes.
pub struct PipelineDeps {
    pub stt: Arc<dyn SttProvider>,
    pub rewriter: Arc<dyn RewriteProvider>,
    pub paster: Arc<dyn TextPaster>,
    pub prefs: Arc<dyn PreferencesReader>,
    /// Optional transcode step for large captures.
    pub converter: Option<Arc<dyn AudioConverter>>,
    pub diagnostics: Arc<dyn DiagnosticsSink>,
    pub on_timing: Option<TimingHandler>,
}

impl PipelineDeps {
    /// Minimal dependency set; converter, diagnostics and timing callback
    /// default to inert implementations.
    pub fn new(
        stt: Arc<dyn SttProvider>,
        rewriter: Arc<dyn RewriteProvider>,
        paster: Arc<dyn TextPaster>,
        prefs: Arc<dyn PreferencesReader>,
    ) -> Self {
        Self {
            stt,
            rewriter,
            paster,
            prefs,
            converter: None,
            diagnostics: Arc::new(NullSink),
            on_timing: None,
        }
    }
}

pub struct DictationPipeline {
    deps: PipelineDeps,
    config: PipelineConfig,
    rewrite_stage: RewriteStage,
}

impl DictationPipeline {
    pub fn new(deps: PipelineDeps, mut config: PipelineConfig) -> Self {
        config.normalize();
        let cache = config
            .enable_rewrite_cache
            .then(|| Arc::new(RewriteCache::new(config.cache)));
        let rewrite_stage = RewriteStage::new(
            Arc::clone(&deps.rewriter),
            cache,
            config.rewrite_timeouts,
            Arc::clone(&deps.diagnostics),
        );
        Self {
            deps,
            config,
            rewrite_stage,
        }
    }

    /// Process one captured asset end to end: transcribe, rewrite per the
    /// current preferences, paste. Returns the pasted text.
    pub async fn process(&self, asset: AudioAsset) -> Result<String> {
        let mut timing = PipelineTiming::new(asset.size_bytes);
        let result = self.process_inner(asset, &mut timing).await;

        match &result {
            Ok(_) => info!("dictation complete: {}", timing.summary()),
            Err(err) => warn!("dictation failed ({err}): {}", timing.summary()),
        }
        if let Some(handler) = &self.deps.on_timing {
            handler(&timing);
        }
        result
    }

    /// Re-run the rewrite/paste tail for an existing transcript, e.g. when
    /// the user retries at a different level. No STT involved.
    pub async fn process_transcript(&self, transcript: &str) -> Result<String> {
        let level = self.deps.prefs.processing_level();
        self.process_transcript_with(transcript, level, false).await
    }

    /// Like [`process_transcript`](Self::process_transcript) but with an
    /// explicit level and cache policy. `bypass_cache` forces a fresh
    /// rewrite even when a cached result exists.
    pub async fn process_transcript_with(
        &self,
        transcript: &str,
        level: ProcessingLevel,
        bypass_cache: bool,
    ) -> Result<String> {
        let mut timing = PipelineTiming::new(0);
        timing.level = Some(level);

        let result = self
            .reprocess_inner(transcript, level, bypass_cache, &mut timing)
            .await;

        match &result {
            Ok(_) => info!("transcript reprocessed: {}", timing.summary()),
            Err(err) => warn!("transcript reprocess failed ({err}): {}", timing.summary()),
        }
        if let Some(handler) = &self.deps.on_timing {
            handler(&timing);
        }
        result
    }

    async fn reprocess_inner(
        &self,
        transcript: &str,
        level: ProcessingLevel,
        bypass_cache: bool,
        timing: &mut PipelineTiming,
    ) -> Result<String> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(PipelineError::NoTranscript);
        }

        let text = self.rewrite(transcript, level, bypass_cache, timing).await?;
        self.paste(&text, timing).await?;
        Ok(text)
    }

    async fn process_inner(
        &self,
        asset: AudioAsset,
        timing: &mut PipelineTiming,
    ) -> Result<String> {
        let asset = self.encode(asset, timing).await;
        let transcript = self.transcribe(&asset, timing).await?;
        drop(asset);

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(PipelineError::NoTranscript);
        }
        debug!(chars = transcript.chars().count(), "transcript ready");

        let level = self.deps.prefs.processing_level();
        timing.level = Some(level);

        let text = if level == ProcessingLevel::Raw {
            // Raw never enters the rewrite stage; its outcome stays unset so
            // outcome counts only cover rewrite-eligible requests.
            transcript
        } else {
            self.rewrite(&transcript, level, false, timing).await?
        };

        self.paste(&text, timing).await?;
        Ok(text)
    }

    /// Transcode large captures to a smaller upload format. Small assets
    /// skip the stage; any converter failure keeps the original asset.
    async fn encode(&self, asset: AudioAsset, timing: &mut PipelineTiming) -> AudioAsset {
        let converter = match &self.deps.converter {
            Some(converter) if asset.size_bytes >= self.config.encode_bypass_threshold => converter,
            _ => return asset,
        };

        let started = Instant::now();
        let result = converter.convert(&asset).await;
        timing.encode = started.elapsed();

        match result {
            Ok(encoded) => {
                timing.encoded_size_bytes = encoded.size_bytes;
                debug!(
                    from_bytes = asset.size_bytes,
                    to_bytes = encoded.size_bytes,
                    "asset transcoded"
                );
                encoded
            }
            Err(err) => {
                warn!("transcode failed, uploading original: {err}");
                diagnostics::emit(
                    &self.deps.diagnostics,
                    DiagnosticsEvent::new("encode_fallback")
                        .with("size_bytes", asset.size_bytes)
                        .with("error", err.to_string()),
                );
                asset
            }
        }
    }

    /// Run the STT chain under the hard pipeline deadline. The chain itself
    /// retries and falls back internally; the deadline bounds the worst case.
    async fn transcribe(&self, asset: &AudioAsset, timing: &mut PipelineTiming) -> Result<String> {
        let started = Instant::now();
        let attempt = self.deps.stt.transcribe(asset);
        let result = tokio::time::timeout(self.config.pipeline_timeout, attempt).await;
        timing.stt = started.elapsed();

        match result {
            Ok(transcript) => Ok(transcript?),
            Err(_elapsed) => {
                let secs = self.config.pipeline_timeout.as_secs();
                warn!(timeout_secs = secs, "stt stage hit the pipeline deadline");
                Err(PipelineError::Stt(SttError::Network(format!(
                    "transcription exceeded the {secs}s pipeline deadline"
                ))))
            }
        }
    }

    async fn rewrite(
        &self,
        transcript: &str,
        level: ProcessingLevel,
        bypass_cache: bool,
        timing: &mut PipelineTiming,
    ) -> Result<String> {
        let model = match self.deps.prefs.selected_model() {
            model if model.is_empty() => level.default_model().to_string(),
            model => model,
        };
        let custom_context = self.deps.prefs.custom_context();

        let stage = self
            .rewrite_stage
            .run(
                transcript,
                level,
                &model,
                custom_context.as_deref(),
                bypass_cache,
            )
            .await;
        timing.rewrite = stage.elapsed;
        timing.rewrite_outcome = Some(stage.outcome);

        // The stage can only degrade to raw, never fail — but raw itself
        // may be empty-equivalent after a gate rejection trims it away.
        let text = stage.text.trim().to_string();
        if text.is_empty() {
            return Err(PipelineError::NoTranscript);
        }
        Ok(text)
    }

    async fn paste(&self, text: &str, timing: &mut PipelineTiming) -> Result<()> {
        let started = Instant::now();
        let result = self.deps.paster.paste(text).await;
        timing.paste = started.elapsed();
        result.map_err(PipelineError::from)
    }
}
