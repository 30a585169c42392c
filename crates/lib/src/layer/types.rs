use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lock::LockError;
use crate::platform::Platform;
use crate::platform::immutable::ImmutableError;
use crate::util::hash::{ContentHash, DirHashError};

/// Current version of the per-layer index format.
pub const LAYER_INDEX_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LayerError {
  #[error("{path} was not produced by `layerpack bundle` (no bundle marker)")]
  NotAnArtifact { path: PathBuf },

  #[error("artifact at {path} changed after bundling (expected {expected}, found {actual})")]
  ArtifactModified {
    path: PathBuf,
    expected: ContentHash,
    actual: ContentHash,
  },

  #[error("invalid layer name '{0}': use letters, digits, '-' or '_' (at most 140 characters)")]
  InvalidName(String),

  #[error("layer '{0}' has no published versions")]
  NotFound(String),

  #[error("layer '{name}' has no version {version}")]
  VersionNotFound { name: String, version: u32 },

  #[error("unsupported layer index version {0}")]
  UnsupportedIndexVersion(u32),

  #[error(transparent)]
  Locked(#[from] LockError),

  #[error("failed to write archive: {0}")]
  Archive(#[from] zip::result::ZipError),

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize layer metadata: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("{path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Hash(#[from] DirHashError),

  #[error(transparent)]
  Immutable(#[from] ImmutableError),
}

/// One immutable, published version of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerVersion {
  pub name: String,
  /// Starts at 1 and increases by one per publish.
  pub version: u32,
  /// `layer:<name>:<version>`
  pub identifier: String,
  pub platform: Platform,
  /// Hash of the artifact directory the layer was built from.
  pub content_hash: ContentHash,
  /// SHA-256 of `layer.zip`.
  pub archive_sha256: ContentHash,
  /// Unzipped size.
  pub size_bytes: u64,
  pub archive_bytes: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub compatible_runtimes: Vec<String>,
  /// Path prefix every entry was placed under inside the archive.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub prefix: Option<String>,
  /// Unix timestamp (seconds).
  pub created_at: u64,
}

impl LayerVersion {
  pub fn identifier_for(name: &str, version: u32) -> String {
    format!("layer:{}:{}", name, version)
  }
}

/// Summary entry in a layer's `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerIndexEntry {
  pub version: u32,
  pub identifier: String,
  pub platform: Platform,
  pub content_hash: ContentHash,
  pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerIndex {
  pub version: u32,
  pub name: String,
  pub versions: Vec<LayerIndexEntry>,
}

impl LayerIndex {
  pub fn new(name: &str) -> Self {
    Self {
      version: LAYER_INDEX_VERSION,
      name: name.to_string(),
      versions: Vec::new(),
    }
  }

  /// Next version number. Never reuses a number, even if entries were
  /// removed by hand.
  pub fn next_version(&self) -> u32 {
    self.versions.iter().map(|v| v.version).max().unwrap_or(0) + 1
  }

  pub fn latest(&self) -> Option<&LayerIndexEntry> {
    self.versions.iter().max_by_key(|v| v.version)
  }
}

/// Publish-time metadata.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
  pub name: String,
  pub description: Option<String>,
  pub compatible_runtimes: Vec<String>,
  /// Directory inside the archive that holds the artifact (e.g. `nodejs`).
  pub prefix: Option<String>,
}

impl PublishOptions {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }
}
