//! Ordered model fallback for the aggregator rewrite backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::diagnostics::{self, DiagnosticsEvent, DiagnosticsSink};
use crate::error::RewriteError;
use crate::provider::RewriteProvider;

/// Invoked with the model actually served and whether it was a fallback.
/// Observability/billing attribution only — never part of the return value.
pub type ModelUsedCallback = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Tries the requested model first, then each configured fallback model in
/// order. Only the last failure surfaces.
pub struct ModelFallbackRewriter {
    inner: Arc<dyn RewriteProvider>,
    fallback_models: Vec<String>,
    on_model_used: Option<ModelUsedCallback>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl ModelFallbackRewriter {
    pub fn new(
        inner: Arc<dyn RewriteProvider>,
        fallback_models: Vec<String>,
        on_model_used: Option<ModelUsedCallback>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            inner,
            fallback_models,
            on_model_used,
            diagnostics,
        }
    }

    fn model_chain(&self, requested: &str) -> Vec<String> {
        let mut chain = vec![requested.to_string()];
        for model in &self.fallback_models {
            if model != requested {
                chain.push(model.clone());
            }
        }
        chain
    }
}

#[async_trait]
impl RewriteProvider for ModelFallbackRewriter {
    async fn rewrite(
        &self,
        transcript: &str,
        system_prompt: &str,
        model: &str,
    ) -> Result<String, RewriteError> {
        let chain = self.model_chain(model);
        let last_index = chain.len() - 1;
        let mut last_error = None;

        for (index, candidate_model) in chain.iter().enumerate() {
            match self
                .inner
                .rewrite(transcript, system_prompt, candidate_model)
                .await
            {
                Ok(text) => {
                    if let Some(callback) = &self.on_model_used {
                        callback(candidate_model, index > 0);
                    }
                    return Ok(text);
                }
                Err(err) => {
                    if index < last_index {
                        warn!(
                            model = %candidate_model,
                            next = %chain[index + 1],
                            "rewrite model failed, trying next: {}",
                            err.summary()
                        );
                        diagnostics::emit(
                            &self.diagnostics,
                            DiagnosticsEvent::new("rewrite_model_fallback")
                                .with("failed_model", candidate_model.as_str())
                                .with("next_model", chain[index + 1].as_str())
                                .with("error", err.summary()),
                        );
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RewriteError::Unknown("no models configured".into())))
    }
}
