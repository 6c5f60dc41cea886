//! # orate-core
//!
//! Resilience and orchestration engine for a dictation app.
//!
//! ## Architecture
//!
//! ```text
//! AudioAsset → encode → SttProvider chain → transcript
//!                        (retry → fallback → concurrency limit)
//!                                                │
//!                                        RewriteStage
//!                              (cache → route → deadline → quality gate)
//!                                                │
//!                                          TextPaster::paste
//! ```
//!
//! Provider clients (HTTP, on-device) live in the host application; this
//! crate owns everything between "audio captured" and "text pasted".

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod level;
pub mod pipeline;
pub mod provider;
pub mod rewrite;
pub mod stt;

// Convenience re-exports for downstream crates
pub use config::{CacheConfig, ChainConfig, PipelineConfig, RetryConfig, RewriteStageTimeouts};
pub use diagnostics::{DiagnosticsEvent, DiagnosticsSink, NullSink, TracingSink};
pub use error::{PasteError, PipelineError, Result, RewriteError, SttError};
pub use level::ProcessingLevel;
pub use pipeline::{
    DictationPipeline, PipelineDeps, PipelineTiming, RewriteOutcome, TimingHandler,
};
pub use provider::{
    AudioAsset, AudioConverter, AudioFormat, PreferencesReader, ProviderDescriptor,
    RewriteProvider, SttProvider, TextPaster,
};
pub use stt::{compose_chain, ChainEntry, ComposedChain};
