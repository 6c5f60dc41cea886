//! Engine configuration.
//!
//! All knobs have production defaults; `normalize()` clamps whatever a host
//! or environment supplies into sane ranges instead of failing startup.
//! Environment overrides use the `ORATE_` prefix and only apply when the
//! host has not already set a value explicitly.

use std::time::Duration;

/// Per-level rewrite deadlines. Heavier levels get a longer budget.
#[derive(Debug, Clone, Copy)]
pub struct RewriteStageTimeouts {
    pub clean: Duration,
    pub polish: Duration,
}

impl Default for RewriteStageTimeouts {
    fn default() -> Self {
        Self {
            clean: Duration::from_secs(15),
            polish: Duration::from_secs(30),
        }
    }
}

impl RewriteStageTimeouts {
    /// Deadline for a rewrite-eligible level. `None` for `Raw`, which never
    /// reaches the rewrite stage.
    pub fn for_level(&self, level: crate::ProcessingLevel) -> Option<Duration> {
        match level {
            crate::ProcessingLevel::Raw => None,
            crate::ProcessingLevel::Clean => Some(self.clean),
            crate::ProcessingLevel::Polish => Some(self.polish),
        }
    }
}

/// Rewrite result cache bounds.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
    /// Rewrites longer than this (in characters) bypass storage entirely.
    pub max_character_count: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 128,
            ttl: Duration::from_secs(600),
            max_character_count: 10_000,
        }
    }
}

/// Retry parameters for one STT provider.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// STT chain composition parameters.
#[derive(Debug, Clone, Default)]
pub struct ChainConfig {
    /// Process-wide bound on simultaneous underlying STT calls.
    pub max_concurrent: usize,
    /// Provider id to move to the front of the chain, keeping the rest in
    /// configured order as fallback.
    pub forced_provider: Option<String>,
}

impl ChainConfig {
    pub fn normalize(&mut self) {
        if self.max_concurrent == 0 {
            self.max_concurrent = 8;
        }
        self.max_concurrent = self.max_concurrent.clamp(1, 64);
        self.forced_provider = self
            .forced_provider
            .take()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
    }

    pub fn from_env() -> Self {
        let mut config = Self {
            max_concurrent: env_usize("ORATE_MAX_CONCURRENT_STT").unwrap_or(8),
            forced_provider: std::env::var("ORATE_FORCED_STT_PROVIDER").ok(),
        };
        config.normalize();
        config
    }
}

/// Pipeline orchestrator configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Hard cap on the whole multi-provider STT stage. Without it, a
    /// worst-case chain (every provider, every retry) runs for minutes.
    pub pipeline_timeout: Duration,
    pub rewrite_timeouts: RewriteStageTimeouts,
    pub enable_rewrite_cache: bool,
    pub cache: CacheConfig,
    /// Assets smaller than this (bytes) skip the transcode stage.
    pub encode_bypass_threshold: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_timeout: Duration::from_secs(120),
            rewrite_timeouts: RewriteStageTimeouts::default(),
            enable_rewrite_cache: true,
            cache: CacheConfig::default(),
            encode_bypass_threshold: 200_000,
        }
    }
}

impl PipelineConfig {
    pub fn normalize(&mut self) {
        self.pipeline_timeout = clamp_duration(
            self.pipeline_timeout,
            Duration::from_secs(5),
            Duration::from_secs(600),
        );
        self.rewrite_timeouts.clean = clamp_duration(
            self.rewrite_timeouts.clean,
            Duration::from_secs(1),
            Duration::from_secs(120),
        );
        self.rewrite_timeouts.polish = clamp_duration(
            self.rewrite_timeouts.polish,
            Duration::from_secs(1),
            Duration::from_secs(120),
        );
        self.cache.max_entries = self.cache.max_entries.clamp(1, 4096);
        self.cache.ttl = clamp_duration(
            self.cache.ttl,
            Duration::from_secs(1),
            Duration::from_secs(24 * 3600),
        );
        self.cache.max_character_count = self.cache.max_character_count.clamp(1, 1_000_000);
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_u64("ORATE_PIPELINE_TIMEOUT_SECS") {
            config.pipeline_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("ORATE_REWRITE_TIMEOUT_CLEAN_SECS") {
            config.rewrite_timeouts.clean = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("ORATE_REWRITE_TIMEOUT_POLISH_SECS") {
            config.rewrite_timeouts.polish = Duration::from_secs(secs);
        }
        if let Ok(raw) = std::env::var("ORATE_REWRITE_CACHE") {
            config.enable_rewrite_cache = raw != "0";
        }
        if let Some(n) = env_usize("ORATE_REWRITE_CACHE_ENTRIES") {
            config.cache.max_entries = n;
        }
        if let Some(secs) = env_u64("ORATE_REWRITE_CACHE_TTL_SECS") {
            config.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(bytes) = env_u64("ORATE_ENCODE_BYPASS_BYTES") {
            config.encode_bypass_threshold = bytes;
        }
        config.normalize();
        config
    }
}

fn clamp_duration(value: Duration, min: Duration, max: Duration) -> Duration {
    value.max(min).min(max)
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessingLevel;

    #[test]
    fn defaults_are_sane() {
        let config = PipelineConfig::default();
        assert_eq!(config.pipeline_timeout, Duration::from_secs(120));
        assert_eq!(config.cache.max_entries, 128);
        assert!(config.enable_rewrite_cache);
    }

    #[test]
    fn raw_level_has_no_rewrite_deadline() {
        let timeouts = RewriteStageTimeouts::default();
        assert!(timeouts.for_level(ProcessingLevel::Raw).is_none());
        assert_eq!(
            timeouts.for_level(ProcessingLevel::Clean),
            Some(Duration::from_secs(15))
        );
        assert_eq!(
            timeouts.for_level(ProcessingLevel::Polish),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn normalize_clamps_out_of_range_values() {
        let mut config = PipelineConfig {
            pipeline_timeout: Duration::from_secs(0),
            ..Default::default()
        };
        config.cache.max_entries = 0;
        config.normalize();
        assert_eq!(config.pipeline_timeout, Duration::from_secs(5));
        assert_eq!(config.cache.max_entries, 1);

        let mut chain = ChainConfig {
            max_concurrent: 0,
            forced_provider: Some("   ".into()),
        };
        chain.normalize();
        assert_eq!(chain.max_concurrent, 8);
        assert!(chain.forced_provider.is_none());
    }
}
