//! Rewrite stage supervision: cache lookup, deadline racing, quality gating.
//!
//! The stage can only ever improve the transcript. Whatever goes wrong in
//! here — timeout, provider error, gate rejection — the raw transcript is
//! returned and the request keeps moving.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RewriteStageTimeouts;
use crate::diagnostics::{self, DiagnosticsEvent, DiagnosticsSink};
use crate::level::ProcessingLevel;
use crate::provider::RewriteProvider;
use crate::rewrite::{prompts, quality, CacheKey, RejectReason, RewriteCache};

/// How the rewrite stage resolved, carried into timing and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Rewrite completed and passed the quality gate.
    Success,
    /// Served from the result cache; no provider call.
    CacheHit,
    /// Candidate was empty after trimming; raw transcript used.
    EmptyRawFallback,
    /// Stage deadline elapsed; raw transcript used.
    TimeoutRawFallback,
    /// Provider error or gate rejection; raw transcript used.
    ErrorRawFallback,
}

impl RewriteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewriteOutcome::Success => "success",
            RewriteOutcome::CacheHit => "cache_hit",
            RewriteOutcome::EmptyRawFallback => "empty_raw_fallback",
            RewriteOutcome::TimeoutRawFallback => "timeout_raw_fallback",
            RewriteOutcome::ErrorRawFallback => "error_raw_fallback",
        }
    }
}

impl std::fmt::Display for RewriteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one supervised rewrite stage run.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Text to carry forward (rewritten on success, raw otherwise).
    pub text: String,
    pub outcome: RewriteOutcome,
    pub elapsed: Duration,
}

pub struct RewriteStage {
    rewriter: Arc<dyn RewriteProvider>,
    cache: Option<Arc<RewriteCache>>,
    timeouts: RewriteStageTimeouts,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl RewriteStage {
    pub fn new(
        rewriter: Arc<dyn RewriteProvider>,
        cache: Option<Arc<RewriteCache>>,
        timeouts: RewriteStageTimeouts,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            rewriter,
            cache,
            timeouts,
            diagnostics,
        }
    }

    /// Run the rewrite stage for one transcript. Never fails: every path
    /// resolves to some text plus an outcome.
    ///
    /// `Raw` short-circuits to the transcript verbatim; callers normally
    /// skip the stage for it, but the invariant holds here too.
    pub async fn run(
        &self,
        transcript: &str,
        level: ProcessingLevel,
        model: &str,
        custom_context: Option<&str>,
        bypass_cache: bool,
    ) -> StageResult {
        let started = Instant::now();

        let deadline = match self.timeouts.for_level(level) {
            Some(deadline) => deadline,
            None => {
                return StageResult {
                    text: transcript.to_string(),
                    outcome: RewriteOutcome::Success,
                    elapsed: started.elapsed(),
                }
            }
        };

        let key = CacheKey::compute(transcript, level, model);
        if !bypass_cache {
            if let Some(text) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
                debug!(%level, "rewrite served from cache");
                let result = StageResult {
                    text,
                    outcome: RewriteOutcome::CacheHit,
                    elapsed: started.elapsed(),
                };
                self.report(level, model, &result, None);
                return result;
            }
        }

        let system_prompt = prompts::system_prompt(level, transcript, custom_context);
        let attempt = self.rewriter.rewrite(transcript, &system_prompt, model);
        let (outcome, text, reason) = match tokio::time::timeout(deadline, attempt).await {
            Err(_elapsed) => {
                warn!(%level, deadline_ms = deadline.as_millis() as u64, "rewrite deadline elapsed");
                (
                    RewriteOutcome::TimeoutRawFallback,
                    transcript.to_string(),
                    Some(format!("deadline_elapsed({}ms)", deadline.as_millis())),
                )
            }
            Ok(Err(err)) => {
                warn!(%level, "rewrite failed: {}", err.summary());
                (
                    RewriteOutcome::ErrorRawFallback,
                    transcript.to_string(),
                    Some(err.summary()),
                )
            }
            Ok(Ok(candidate)) => {
                let decision = quality::evaluate(transcript, &candidate, level);
                if decision.is_acceptable {
                    let accepted = candidate.trim().to_string();
                    if let Some(cache) = &self.cache {
                        cache.put(key, &accepted);
                    }
                    (RewriteOutcome::Success, accepted, None)
                } else {
                    let reason = decision.reason;
                    let outcome = match reason {
                        Some(RejectReason::EmptyCandidate) => RewriteOutcome::EmptyRawFallback,
                        _ => RewriteOutcome::ErrorRawFallback,
                    };
                    warn!(
                        %level,
                        ratio = decision.ratio,
                        "rewrite candidate rejected: {}",
                        reason
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_default()
                    );
                    (
                        outcome,
                        transcript.to_string(),
                        reason.map(|r| r.to_string()),
                    )
                }
            }
        };

        let result = StageResult {
            text,
            outcome,
            elapsed: started.elapsed(),
        };
        self.report(level, model, &result, reason);
        result
    }

    fn report(
        &self,
        level: ProcessingLevel,
        model: &str,
        result: &StageResult,
        reason: Option<String>,
    ) {
        let mut event = DiagnosticsEvent::new("rewrite_stage_outcome")
            .with("level", level.as_str())
            .with("model", model)
            .with("outcome", result.outcome.as_str())
            .with("elapsed_ms", result.elapsed.as_millis() as u64);
        if let Some(reason) = reason {
            event = event.with("reason", reason);
        }
        diagnostics::emit(&self.diagnostics, event);
    }
}
