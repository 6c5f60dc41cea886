//! Resilience audit harness.
//!
//! Drives the full pipeline against simulated flaky providers and reports
//! latency percentiles plus outcome counts. Useful for eyeballing how retry,
//! fallback, and the rewrite deadlines behave under load without touching a
//! real provider.
//!
//! ```text
//! cargo run -p orate-audit -- --requests 64 --fail-rate 0.4 --latency-ms 150
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;

use orate_core::config::{ChainConfig, PipelineConfig, RetryConfig};
use orate_core::error::{PasteError, RewriteError, SttError};
use orate_core::pipeline::{DictationPipeline, PipelineDeps, PipelineTiming};
use orate_core::provider::{
    AudioAsset, AudioFormat, PreferencesReader, RewriteProvider, SttProvider, TextPaster,
};
use orate_core::stt::{compose_chain, ChainEntry};
use orate_core::{ProcessingLevel, TracingSink};

#[derive(Debug)]
struct Args {
    requests: usize,
    fail_rate: f64,
    latency_ms: u64,
    level: ProcessingLevel,
    max_concurrent: usize,
    seed: u64,
    output: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        requests: 32,
        fail_rate: 0.3,
        latency_ms: 120,
        level: ProcessingLevel::Clean,
        max_concurrent: 8,
        seed: 42,
        output: None,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--requests" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --requests".into());
                };
                args.requests = v
                    .parse::<usize>()
                    .map_err(|_| "invalid value for --requests".to_string())?
                    .clamp(1, 10_000);
            }
            "--fail-rate" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --fail-rate".into());
                };
                args.fail_rate = v
                    .parse::<f64>()
                    .map_err(|_| "invalid value for --fail-rate".to_string())?
                    .clamp(0.0, 1.0);
            }
            "--latency-ms" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --latency-ms".into());
                };
                args.latency_ms = v
                    .parse::<u64>()
                    .map_err(|_| "invalid value for --latency-ms".to_string())?;
            }
            "--level" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --level".into());
                };
                args.level = match v.as_str() {
                    "raw" => ProcessingLevel::Raw,
                    "clean" => ProcessingLevel::Clean,
                    "polish" => ProcessingLevel::Polish,
                    other => return Err(format!("unknown level: {other}")),
                };
            }
            "--max-concurrent" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --max-concurrent".into());
                };
                args.max_concurrent = v
                    .parse::<usize>()
                    .map_err(|_| "invalid value for --max-concurrent".to_string())?;
            }
            "--seed" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --seed".into());
                };
                args.seed = v
                    .parse::<u64>()
                    .map_err(|_| "invalid value for --seed".to_string())?;
            }
            "--output" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --output".into());
                };
                args.output = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cargo run -p orate-audit -- \\
  [--requests <n>] [--fail-rate <0..1>] [--latency-ms <n>] \\
  [--level raw|clean|polish] [--max-concurrent <n>] [--seed <n>] \\
  [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    Ok(args)
}

// ── simulated providers ────────────────────────────────────────────────────

/// STT provider that fails a configured fraction of calls with a retryable
/// error. Deterministic for a given seed.
struct FlakyStt {
    name: &'static str,
    fail_rate: f64,
    latency: Duration,
    rng: Mutex<StdRng>,
    calls: AtomicUsize,
}

#[async_trait]
impl SttProvider for FlakyStt {
    async fn transcribe(&self, _asset: &AudioAsset) -> Result<String, SttError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.latency).await;
        let roll: f64 = self.rng.lock().gen();
        if roll < self.fail_rate {
            Err(SttError::Network("simulated connection reset".into()))
        } else {
            Ok(format!(
                "um so this is uh a simulated transcript from {}",
                self.name
            ))
        }
    }
}

struct FlakyRewriter {
    fail_rate: f64,
    latency: Duration,
    rng: Mutex<StdRng>,
}

#[async_trait]
impl RewriteProvider for FlakyRewriter {
    async fn rewrite(
        &self,
        transcript: &str,
        _system_prompt: &str,
        _model: &str,
    ) -> Result<String, RewriteError> {
        tokio::time::sleep(self.latency).await;
        let roll: f64 = self.rng.lock().gen();
        if roll < self.fail_rate {
            return Err(RewriteError::Throttled);
        }
        let cleaned: Vec<&str> = transcript
            .split_whitespace()
            .filter(|w| !matches!(*w, "um" | "uh" | "so"))
            .collect();
        Ok(cleaned.join(" "))
    }
}

struct CountingPaster(AtomicUsize);

#[async_trait]
impl TextPaster for CountingPaster {
    async fn paste(&self, _text: &str) -> Result<(), PasteError> {
        self.0.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct FixedPrefs(ProcessingLevel);

impl PreferencesReader for FixedPrefs {
    fn processing_level(&self) -> ProcessingLevel {
        self.0
    }

    fn selected_model(&self) -> String {
        String::new()
    }
}

// ── report ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct RequestResult {
    index: usize,
    ok: bool,
    latency_ms: f64,
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Summary {
    requests: usize,
    fail_rate: f64,
    level: String,
    chain: String,
    succeeded: usize,
    failed: usize,
    pastes: usize,
    stt_calls: usize,
    p50_latency_ms: f64,
    p95_latency_ms: f64,
    avg_latency_ms: f64,
    outcomes: std::collections::BTreeMap<String, usize>,
    results: Vec<RequestResult>,
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted.len() == 1 {
        return sorted[0];
    }
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

// ── run ────────────────────────────────────────────────────────────────────

async fn run(args: Args) -> anyhow::Result<Summary> {
    let latency = Duration::from_millis(args.latency_ms);

    let primary = Arc::new(FlakyStt {
        name: "primary",
        fail_rate: args.fail_rate,
        latency,
        rng: Mutex::new(StdRng::seed_from_u64(args.seed)),
        calls: AtomicUsize::new(0),
    });
    // The backstop fails half as often as the primary.
    let secondary = Arc::new(FlakyStt {
        name: "secondary",
        fail_rate: args.fail_rate / 2.0,
        latency,
        rng: Mutex::new(StdRng::seed_from_u64(args.seed.wrapping_add(1))),
        calls: AtomicUsize::new(0),
    });

    let mut chain_config = ChainConfig {
        max_concurrent: args.max_concurrent,
        forced_provider: None,
    };
    chain_config.normalize();

    let retry = RetryConfig {
        max_retries: 3,
        base_delay: Duration::from_millis(50),
    };
    let entries = vec![
        ChainEntry {
            id: "primary".into(),
            display_name: "Primary".into(),
            model: "scribe-1".into(),
            provider: primary.clone(),
            retry,
        },
        ChainEntry {
            id: "secondary".into(),
            display_name: "Secondary".into(),
            model: "scribe-1".into(),
            provider: secondary.clone(),
            retry: RetryConfig {
                max_retries: 2,
                ..retry
            },
        },
    ];

    let diagnostics = Arc::new(TracingSink);
    let Some(chain) = compose_chain(entries, &chain_config, diagnostics.clone()) else {
        bail!("no stt providers configured");
    };
    info!(chain = %chain.label, "audit chain assembled");

    let rewriter = Arc::new(FlakyRewriter {
        fail_rate: args.fail_rate / 2.0,
        latency,
        rng: Mutex::new(StdRng::seed_from_u64(args.seed.wrapping_add(2))),
    });
    let paster = Arc::new(CountingPaster(AtomicUsize::new(0)));

    let timings: Arc<Mutex<Vec<PipelineTiming>>> = Arc::new(Mutex::new(Vec::new()));
    let timings_clone = Arc::clone(&timings);

    let mut deps = PipelineDeps::new(
        Arc::clone(&chain.provider),
        rewriter,
        paster.clone(),
        Arc::new(FixedPrefs(args.level)),
    );
    deps.diagnostics = diagnostics;
    deps.on_timing = Some(Arc::new(move |t| timings_clone.lock().push(t.clone())));

    let pipeline = Arc::new(DictationPipeline::new(deps, PipelineConfig::default()));

    let mut handles = Vec::with_capacity(args.requests);
    for index in 0..args.requests {
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            let asset = AudioAsset::from_bytes(AudioFormat::Wav, vec![0u8; 1024]);
            let started = Instant::now();
            let result = pipeline.process(asset).await;
            (index, started.elapsed(), result)
        }));
    }

    let mut results = Vec::with_capacity(args.requests);
    for handle in handles {
        let (index, elapsed, result) = handle.await.context("audit task panicked")?;
        results.push(RequestResult {
            index,
            ok: result.is_ok(),
            latency_ms: elapsed.as_secs_f64() * 1000.0,
            error: result.err().map(|e| e.to_string()),
        });
    }
    results.sort_by_key(|r| r.index);

    // Timings arrive in completion order; outcome counts don't need pairing
    // with individual requests.
    let mut outcomes = std::collections::BTreeMap::new();
    for timing in timings.lock().iter() {
        if let Some(outcome) = timing.rewrite_outcome {
            *outcomes.entry(outcome.as_str().to_string()).or_insert(0) += 1;
        }
    }

    let latencies: Vec<f64> = results.iter().map(|r| r.latency_ms).collect();
    let succeeded = results.iter().filter(|r| r.ok).count();

    Ok(Summary {
        requests: args.requests,
        fail_rate: args.fail_rate,
        level: args.level.as_str().to_string(),
        chain: chain.label.clone(),
        succeeded,
        failed: args.requests - succeeded,
        pastes: paster.0.load(Ordering::Relaxed),
        stt_calls: primary.calls.load(Ordering::Relaxed)
            + secondary.calls.load(Ordering::Relaxed),
        p50_latency_ms: percentile(&latencies, 0.50),
        p95_latency_ms: percentile(&latencies, 0.95),
        avg_latency_ms: latencies.iter().sum::<f64>() / latencies.len().max(1) as f64,
        outcomes,
        results,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orate=info".parse().unwrap()),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("run with --help for usage");
            std::process::exit(2);
        }
    };
    info!(?args, "audit starting");

    let output = args.output.clone();
    let summary = run(args).await?;

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        p50_ms = summary.p50_latency_ms,
        p95_ms = summary.p95_latency_ms,
        "audit complete"
    );

    let json = serde_json::to_string_pretty(&summary)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            println!("report written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
