//! Capability contracts the engine consumes.
//!
//! Every network-bound or OS-bound collaborator enters the pipeline through
//! one of these traits. Provider clients (HTTP, on-device, …) live outside
//! this crate; tests and the audit harness plug in fakes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, PasteError, RewriteError, SttError};
use crate::level::ProcessingLevel;

// ---------------------------------------------------------------------------
// Audio asset
// ---------------------------------------------------------------------------

/// Container format of a captured audio asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Caf,
    Wav,
    Opus,
}

/// Where the audio bytes live. `Bytes` keeps clones cheap for retries.
#[derive(Debug, Clone)]
pub enum AssetSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// Captured audio for one request. Created by the caller, consumed once by
/// the pipeline, dropped after the STT stage.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub format: AudioFormat,
    pub duration: Option<Duration>,
    pub size_bytes: u64,
    pub source: AssetSource,
}

impl AudioAsset {
    pub fn from_bytes(format: AudioFormat, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            format,
            duration: None,
            size_bytes: bytes.len() as u64,
            source: AssetSource::Bytes(bytes),
        }
    }

    pub fn from_path(format: AudioFormat, path: PathBuf, size_bytes: u64) -> Self {
        Self {
            format,
            duration: None,
            size_bytes,
            source: AssetSource::Path(path),
        }
    }
}

// ---------------------------------------------------------------------------
// Provider descriptors
// ---------------------------------------------------------------------------

/// Static configuration for one STT provider in the chain.
/// Built at startup, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Stable identifier used by the forced-provider override.
    pub id: String,
    /// Human-readable name used in logs and diagnostics.
    pub display_name: String,
    /// Model the provider is invoked with.
    pub model: String,
    /// Position in the composed chain (0 = tried first). Assigned during
    /// assembly; reflects any forced-provider reorder.
    pub position: usize,
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Speech-to-text provider.
#[async_trait]
pub trait SttProvider: Send + Sync {
    async fn transcribe(&self, asset: &AudioAsset) -> Result<String, SttError>;
}

/// Text rewriting provider.
#[async_trait]
pub trait RewriteProvider: Send + Sync {
    async fn rewrite(
        &self,
        transcript: &str,
        system_prompt: &str,
        model: &str,
    ) -> Result<String, RewriteError>;
}

/// Pastes final text into the frontmost application.
#[async_trait]
pub trait TextPaster: Send + Sync {
    async fn paste(&self, text: &str) -> Result<(), PasteError>;
}

/// Transcodes a captured asset to a smaller upload format.
/// Any failure here is non-fatal; the pipeline falls back to the original.
#[async_trait]
pub trait AudioConverter: Send + Sync {
    async fn convert(&self, asset: &AudioAsset) -> Result<AudioAsset, ConvertError>;
}

/// Read-only access to the caller's preferences.
pub trait PreferencesReader: Send + Sync {
    fn processing_level(&self) -> ProcessingLevel;

    /// Requested rewrite model id. Empty means "use the level default".
    fn selected_model(&self) -> String;

    /// Extra context appended to the rewrite system prompt (vocabulary,
    /// style notes). `None` when the user configured nothing.
    fn custom_context(&self) -> Option<String> {
        None
    }
}
