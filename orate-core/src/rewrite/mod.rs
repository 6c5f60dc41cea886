//! Rewrite stage: routing, model fallback, result cache, quality gate,
//! prompt construction.

pub mod cache;
pub mod model_fallback;
pub mod prompts;
pub mod quality;
pub mod router;

pub use cache::{CacheKey, RewriteCache};
pub use model_fallback::{ModelFallbackRewriter, ModelUsedCallback};
pub use quality::{evaluate, GateDecision, RejectReason};
pub use router::{RewriteRouter, RouterConfig};
