//! Layer storage.
//!
//! # Storage Layout
//!
//! ```text
//! {store}/
//! ├── .store.lock
//! └── layers/<name>/
//!     ├── index.json          # LayerIndex: every published version
//!     └── <version>/
//!         ├── layer.zip       # Deterministic archive of the artifact
//!         └── layer.json      # LayerVersion metadata
//! ```
//!
//! Version directories are made read-only once written and are never
//! modified or deleted by the store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info};

use super::archive::write_archive;
use super::types::{LAYER_INDEX_VERSION, LayerError, LayerIndex, LayerIndexEntry, LayerVersion, PublishOptions};
use crate::bundle::read_marker;
use crate::consts::BUNDLE_MARKER;
use crate::lock::DirLock;
use crate::platform::immutable::make_immutable;
use crate::platform::paths::store_dir;
use crate::util::hash::{hash_directory, hash_file};

const LAYERS_DIR: &str = "layers";
const INDEX_FILENAME: &str = "index.json";
const ARCHIVE_FILENAME: &str = "layer.zip";
const METADATA_FILENAME: &str = "layer.json";
const LOCK_FILENAME: &str = ".store.lock";
const MAX_NAME_LEN: usize = 140;

/// Manages published layer versions on disk.
#[derive(Debug, Clone)]
pub struct LayerStore {
  base_path: PathBuf,
}

impl LayerStore {
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  /// Store at `$LAYERPACK_STORE`, or the per-user data directory.
  pub fn default_store() -> Self {
    Self::new(store_dir())
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  fn layer_dir(&self, name: &str) -> PathBuf {
    self.base_path.join(LAYERS_DIR).join(name)
  }

  fn index_path(&self, name: &str) -> PathBuf {
    self.layer_dir(name).join(INDEX_FILENAME)
  }

  fn version_dir(&self, name: &str, version: u32) -> PathBuf {
    self.layer_dir(name).join(version.to_string())
  }

  /// Path of a version's archive.
  pub fn archive_path(&self, name: &str, version: u32) -> PathBuf {
    self.version_dir(name, version).join(ARCHIVE_FILENAME)
  }

  /// Publish the artifact directory at `artifact` as a new layer version.
  ///
  /// The version number is allocated under an exclusive store lock. The
  /// archive and metadata are written to a temporary directory and renamed
  /// into place, so a version directory is either complete or absent.
  pub fn publish(&self, artifact: &Path, options: &PublishOptions) -> Result<LayerVersion, LayerError> {
    validate_name(&options.name)?;

    let marker = read_marker(artifact).ok_or_else(|| LayerError::NotAnArtifact {
      path: artifact.to_path_buf(),
    })?;
    let actual = hash_directory(artifact, &[BUNDLE_MARKER])?;
    if actual != marker.content_hash {
      return Err(LayerError::ArtifactModified {
        path: artifact.to_path_buf(),
        expected: marker.content_hash,
        actual,
      });
    }

    let layer_dir = self.layer_dir(&options.name);
    fs::create_dir_all(&layer_dir).map_err(io_at(&layer_dir))?;
    let lock_path = self.base_path.join(LOCK_FILENAME);
    let _lock = DirLock::acquire(&lock_path, &self.base_path, "publish")?;

    let mut index = self.load_index(&options.name)?;
    let version = self.free_version(&options.name, index.next_version());
    let identifier = LayerVersion::identifier_for(&options.name, version);
    info!(layer = %identifier, artifact = %artifact.display(), "publishing");

    let staging = tempfile::Builder::new()
      .prefix(".publish-")
      .tempdir_in(&layer_dir)
      .map_err(io_at(&layer_dir))?;
    let archive = staging.path().join(ARCHIVE_FILENAME);
    write_archive(artifact, &archive, options.prefix.as_deref(), &[BUNDLE_MARKER])?;

    let archive_bytes = fs::metadata(&archive).map_err(io_at(&archive))?.len();
    let layer = LayerVersion {
      name: options.name.clone(),
      version,
      identifier,
      platform: marker.platform,
      content_hash: marker.content_hash,
      archive_sha256: hash_file(&archive)?,
      size_bytes: marker.size_bytes,
      archive_bytes,
      description: options.description.clone(),
      compatible_runtimes: options.compatible_runtimes.clone(),
      prefix: options.prefix.clone(),
      created_at: now_unix(),
    };
    write_json(&staging.path().join(METADATA_FILENAME), &layer)?;

    let version_dir = self.version_dir(&options.name, version);
    fs::rename(staging.path(), &version_dir).map_err(io_at(&version_dir))?;

    // Record the version before sealing it, so a failed seal never hides it
    index.versions.push(LayerIndexEntry {
      version,
      identifier: layer.identifier.clone(),
      platform: layer.platform,
      content_hash: layer.content_hash.clone(),
      created_at: layer.created_at,
    });
    self.save_index(&index)?;
    make_immutable(&version_dir)?;

    info!(
      layer = %layer.identifier,
      archive_bytes = layer.archive_bytes,
      hash = %layer.content_hash.short(),
      "published"
    );
    Ok(layer)
  }

  /// Load a layer's index. Returns an empty index if nothing was published.
  pub fn load_index(&self, name: &str) -> Result<LayerIndex, LayerError> {
    let path = self.index_path(name);

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LayerIndex::new(name)),
      Err(source) => return Err(LayerError::Io { path, source }),
    };

    let index: LayerIndex = serde_json::from_str(&content).map_err(|source| LayerError::Parse {
      path: path.clone(),
      source,
    })?;

    if index.version != LAYER_INDEX_VERSION {
      return Err(LayerError::UnsupportedIndexVersion(index.version));
    }

    Ok(index)
  }

  /// First version at or after `candidate` with no directory on disk. A
  /// publish interrupted after its rename leaves a directory the index does
  /// not list; that number stays taken.
  fn free_version(&self, name: &str, candidate: u32) -> u32 {
    let mut version = candidate;
    while self.version_dir(name, version).exists() {
      debug!(layer = name, version, "version directory exists but is not indexed, skipping");
      version += 1;
    }
    version
  }

  fn save_index(&self, index: &LayerIndex) -> Result<(), LayerError> {
    write_json(&self.index_path(&index.name), index)
  }

  /// All versions of `name`, oldest first.
  pub fn list(&self, name: &str) -> Result<Vec<LayerVersion>, LayerError> {
    validate_name(name)?;
    let mut versions: Vec<u32> = self.load_index(name)?.versions.iter().map(|v| v.version).collect();
    versions.sort_unstable();
    versions.into_iter().map(|version| self.get(name, version)).collect()
  }

  /// Most recently published version of `name`.
  pub fn latest(&self, name: &str) -> Result<LayerVersion, LayerError> {
    validate_name(name)?;
    let index = self.load_index(name)?;
    let entry = index.latest().ok_or_else(|| LayerError::NotFound(name.to_string()))?;
    self.get(name, entry.version)
  }

  pub fn get(&self, name: &str, version: u32) -> Result<LayerVersion, LayerError> {
    validate_name(name)?;
    let path = self.version_dir(name, version).join(METADATA_FILENAME);

    let content = fs::read_to_string(&path).map_err(|source| {
      if source.kind() == io::ErrorKind::NotFound {
        LayerError::VersionNotFound {
          name: name.to_string(),
          version,
        }
      } else {
        LayerError::Io {
          path: path.clone(),
          source,
        }
      }
    })?;

    serde_json::from_str(&content).map_err(|source| LayerError::Parse { path, source })
  }

  /// Names of every layer with at least one index, sorted.
  pub fn names(&self) -> Result<Vec<String>, LayerError> {
    let layers = self.base_path.join(LAYERS_DIR);
    let entries = match fs::read_dir(&layers) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => return Err(LayerError::Io { path: layers, source }),
    };

    let mut names = Vec::new();
    for entry in entries {
      let entry = entry.map_err(io_at(&layers))?;
      if entry.path().join(INDEX_FILENAME).is_file() {
        names.push(entry.file_name().to_string_lossy().to_string());
      }
    }
    names.sort();
    debug!(count = names.len(), "listed layers");
    Ok(names)
  }
}

/// Layer names follow the function runtime's rules.
fn validate_name(name: &str) -> Result<(), LayerError> {
  let valid = !name.is_empty()
    && name.len() <= MAX_NAME_LEN
    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if valid {
    Ok(())
  } else {
    Err(LayerError::InvalidName(name.to_string()))
  }
}

/// Write JSON via a temp file and rename.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), LayerError> {
  let temp_path = path.with_extension("json.tmp");
  let content = serde_json::to_string_pretty(value).map_err(LayerError::Serialize)?;
  fs::write(&temp_path, content).map_err(io_at(&temp_path))?;
  fs::rename(&temp_path, path).map_err(io_at(path))
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> LayerError {
  let path = path.to_path_buf();
  move |source| LayerError::Io { path, source }
}

fn now_unix() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}
