//! STT provider chain decorators.
//!
//! ## Composition (built once at startup)
//!
//! ```text
//! ProviderA ──► Retrying ─┐
//!                         ├─► Fallback ──► ConcurrencyLimited ──► pipeline
//! ProviderB ──► Retrying ─┘
//! ```
//!
//! Each layer is a plain wrapper value over `Arc<dyn SttProvider>`; nothing
//! is reconfigurable after assembly, which keeps the chain's behavior
//! auditable from the startup wiring alone.

pub mod assembly;
pub mod fallback;
pub mod limiter;
pub mod retry;

pub use assembly::{compose_chain, ChainEntry, ComposedChain};
pub use fallback::FallbackStt;
pub use limiter::ConcurrencyLimitedStt;
pub use retry::RetryingStt;
