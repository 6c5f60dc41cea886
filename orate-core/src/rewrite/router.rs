//! Model-based routing between the native and aggregator rewrite backends.
//!
//! The native backend only understands bare ids from its own namespace
//! (e.g. "gemini-2.5-flash-lite"); the aggregator takes provider-prefixed
//! ids (e.g. "google/gemini-2.5-flash" or "x-ai/grok-4.1-fast"). Some
//! levels default to aggregator-only models, so the router must never hand
//! the native backend an id it cannot serve — and a request is never
//! dropped just because one side failed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::RewriteError;
use crate::provider::RewriteProvider;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Bare-id prefix of the native namespace.
    pub native_prefix: String,
    /// Aggregator-style alias prefix that maps into the native namespace.
    pub native_alias_prefix: String,
    /// Default-equivalent native model used when re-routing an aggregator
    /// failure to the native backend.
    pub native_fallback_model: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            native_prefix: "gemini-".into(),
            native_alias_prefix: "google/gemini-".into(),
            native_fallback_model: "gemini-2.5-flash-lite".into(),
        }
    }
}

pub struct RewriteRouter {
    native: Option<Arc<dyn RewriteProvider>>,
    aggregator: Option<Arc<dyn RewriteProvider>>,
    config: RouterConfig,
}

impl RewriteRouter {
    pub fn new(
        native: Option<Arc<dyn RewriteProvider>>,
        aggregator: Option<Arc<dyn RewriteProvider>>,
        config: RouterConfig,
    ) -> Self {
        Self {
            native,
            aggregator,
            config,
        }
    }

    /// Bare native id for a requested model, if it belongs to the native
    /// namespace (directly or via the aggregator alias form).
    fn native_model(&self, model: &str) -> Option<String> {
        if model.starts_with(&self.config.native_prefix) {
            return Some(model.to_string());
        }
        if model.starts_with(&self.config.native_alias_prefix) {
            return model.split_once('/').map(|(_, bare)| bare.to_string());
        }
        None
    }
}

#[async_trait]
impl RewriteProvider for RewriteRouter {
    async fn rewrite(
        &self,
        transcript: &str,
        system_prompt: &str,
        model: &str,
    ) -> Result<String, RewriteError> {
        if let Some(native_model) = self.native_model(model) {
            if let Some(native) = &self.native {
                debug!(requested = %model, target = %native_model, "rewrite route: native");
                match native.rewrite(transcript, system_prompt, &native_model).await {
                    Ok(text) => return Ok(text),
                    Err(err) => {
                        // Native failure must not drop the request.
                        if let Some(aggregator) = &self.aggregator {
                            warn!(
                                requested = %model,
                                "native rewrite failed, re-routing via aggregator: {}",
                                err.summary()
                            );
                            return aggregator.rewrite(transcript, system_prompt, model).await;
                        }
                        return Err(err);
                    }
                }
            }

            if let Some(aggregator) = &self.aggregator {
                debug!(requested = %model, "rewrite route: native namespace via aggregator");
                return aggregator.rewrite(transcript, system_prompt, model).await;
            }

            return Err(RewriteError::Auth);
        }

        // Aggregator-namespace model ids require the aggregator.
        if let Some(aggregator) = &self.aggregator {
            debug!(requested = %model, "rewrite route: aggregator");
            match aggregator.rewrite(transcript, system_prompt, model).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    if let Some(native) = &self.native {
                        warn!(
                            requested = %model,
                            fallback_model = %self.config.native_fallback_model,
                            "aggregator rewrite failed, trying native default: {}",
                            err.summary()
                        );
                        return native
                            .rewrite(
                                transcript,
                                system_prompt,
                                &self.config.native_fallback_model,
                            )
                            .await;
                    }
                    return Err(err);
                }
            }
        }

        if let Some(native) = &self.native {
            debug!(
                requested = %model,
                fallback_model = %self.config.native_fallback_model,
                "rewrite route: no aggregator, native default"
            );
            return native
                .rewrite(
                    transcript,
                    system_prompt,
                    &self.config.native_fallback_model,
                )
                .await;
        }

        Err(RewriteError::Auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingRewriter {
        calls: Mutex<Vec<String>>,
        result: Result<String, RewriteError>,
    }

    impl RecordingRewriter {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                result: Ok(text.into()),
            })
        }

        fn err(err: RewriteError) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                result: Err(err),
            })
        }
    }

    #[async_trait]
    impl RewriteProvider for RecordingRewriter {
        async fn rewrite(
            &self,
            _transcript: &str,
            _system_prompt: &str,
            model: &str,
        ) -> Result<String, RewriteError> {
            self.calls.lock().push(model.to_string());
            self.result.clone()
        }
    }

    fn router(
        native: Option<Arc<RecordingRewriter>>,
        aggregator: Option<Arc<RecordingRewriter>>,
    ) -> RewriteRouter {
        RewriteRouter::new(
            native.map(|n| n as Arc<dyn RewriteProvider>),
            aggregator.map(|a| a as Arc<dyn RewriteProvider>),
            RouterConfig::default(),
        )
    }

    #[tokio::test]
    async fn native_namespace_routes_to_native_backend() {
        let native = RecordingRewriter::ok("native text");
        let aggregator = RecordingRewriter::ok("aggregator text");
        let r = router(Some(native.clone()), Some(aggregator.clone()));

        let text = r.rewrite("t", "p", "gemini-2.5-flash-lite").await.unwrap();
        assert_eq!(text, "native text");
        assert_eq!(*native.calls.lock(), vec!["gemini-2.5-flash-lite"]);
        assert!(aggregator.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn alias_form_is_stripped_for_the_native_backend() {
        let native = RecordingRewriter::ok("native text");
        let r = router(Some(native.clone()), None);

        r.rewrite("t", "p", "google/gemini-2.5-flash").await.unwrap();
        assert_eq!(*native.calls.lock(), vec!["gemini-2.5-flash"]);
    }

    #[tokio::test]
    async fn native_failure_reroutes_through_aggregator_with_requested_id() {
        let native = RecordingRewriter::err(RewriteError::Network("down".into()));
        let aggregator = RecordingRewriter::ok("aggregator text");
        let r = router(Some(native), Some(aggregator.clone()));

        let text = r.rewrite("t", "p", "gemini-2.5-flash-lite").await.unwrap();
        assert_eq!(text, "aggregator text");
        assert_eq!(*aggregator.calls.lock(), vec!["gemini-2.5-flash-lite"]);
    }

    #[tokio::test]
    async fn aggregator_namespace_routes_to_aggregator() {
        let native = RecordingRewriter::ok("native text");
        let aggregator = RecordingRewriter::ok("aggregator text");
        let r = router(Some(native.clone()), Some(aggregator.clone()));

        let text = r.rewrite("t", "p", "x-ai/grok-4.1-fast").await.unwrap();
        assert_eq!(text, "aggregator text");
        assert!(native.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn aggregator_failure_falls_back_to_native_default_model() {
        let native = RecordingRewriter::ok("native text");
        let aggregator = RecordingRewriter::err(RewriteError::Throttled);
        let r = router(Some(native.clone()), Some(aggregator));

        let text = r.rewrite("t", "p", "x-ai/grok-4.1-fast").await.unwrap();
        assert_eq!(text, "native text");
        assert_eq!(*native.calls.lock(), vec!["gemini-2.5-flash-lite"]);
    }

    #[tokio::test]
    async fn no_backends_fails_with_auth() {
        let r = router(None, None);
        let err = r.rewrite("t", "p", "gemini-2.5-flash-lite").await.unwrap_err();
        assert_eq!(err, RewriteError::Auth);
    }
}
