//! Startup-time STT chain assembly.
//!
//! Single source of truth for chain composition so the app runtime and the
//! audit harness cannot drift apart on retry parameters, provider ordering,
//! or fallback semantics.

use std::sync::Arc;

use tracing::info;

use crate::config::{ChainConfig, RetryConfig};
use crate::diagnostics::DiagnosticsSink;
use crate::provider::{ProviderDescriptor, SttProvider};
use crate::stt::{ConcurrencyLimitedStt, FallbackStt, RetryingStt};

/// One provider plus its static configuration, before composition.
pub struct ChainEntry {
    pub id: String,
    pub display_name: String,
    pub model: String,
    pub provider: Arc<dyn SttProvider>,
    pub retry: RetryConfig,
}

/// The assembled chain: retry-wrapped providers folded into pairwise
/// fallback units, gated by the process-wide concurrency limiter.
pub struct ComposedChain {
    pub provider: Arc<dyn SttProvider>,
    /// Join of all member names, for logs.
    pub label: String,
    /// Members in final attempt order, positions assigned.
    pub descriptors: Vec<ProviderDescriptor>,
}

/// Compose the STT chain. Returns `None` when no providers are configured.
///
/// The forced-provider override (operator/config) moves the named entry to
/// the front; the remaining entries keep their configured relative order as
/// the fallback sequence.
pub fn compose_chain(
    mut entries: Vec<ChainEntry>,
    config: &ChainConfig,
    diagnostics: Arc<dyn DiagnosticsSink>,
) -> Option<ComposedChain> {
    if entries.is_empty() {
        return None;
    }

    if let Some(forced) = config.forced_provider.as_deref() {
        if let Some(index) = entries.iter().position(|e| e.id == forced) {
            let entry = entries.remove(index);
            info!(provider = %entry.id, "forced stt provider moved to front of chain");
            entries.insert(0, entry);
        } else {
            info!(provider = %forced, "forced stt provider not configured; keeping chain order");
        }
    }

    let descriptors: Vec<ProviderDescriptor> = entries
        .iter()
        .enumerate()
        .map(|(position, entry)| ProviderDescriptor {
            id: entry.id.clone(),
            display_name: entry.display_name.clone(),
            model: entry.model.clone(),
            position,
        })
        .collect();

    let mut wrapped = entries.into_iter().map(|entry| {
        let retried: Arc<dyn SttProvider> = Arc::new(RetryingStt::new(
            entry.provider,
            entry.display_name.clone(),
            entry.retry,
            Arc::clone(&diagnostics),
        ));
        (entry.display_name, retried)
    });

    // Left-fold: first → Fallback(first, second) → Fallback(…, third) → …
    let (mut label, mut chain) = wrapped.next()?;
    for (name, provider) in wrapped {
        let unit = FallbackStt::new(
            chain,
            label.clone(),
            provider,
            name,
            Arc::clone(&diagnostics),
        );
        label = unit.label();
        chain = Arc::new(unit);
    }

    let limited = Arc::new(ConcurrencyLimitedStt::new(chain, config.max_concurrent));
    info!(
        chain = %label,
        max_concurrent = config.max_concurrent,
        "stt chain assembled"
    );

    Some(ComposedChain {
        provider: limited,
        label,
        descriptors,
    })
}
