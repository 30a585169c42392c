//! Bundler configuration (`layerpack.toml`).
//!
//! Every key is optional; the defaults reproduce the Prisma layer pipeline
//! (copy `package.json`, `package-lock.json`, `client.js`, `prisma/` and
//! `node_modules`, strip caches and foreign engines, run `prisma generate`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{CONFIG_FILENAME, DEFAULT_SIZE_LIMIT_BYTES};
use crate::platform::Platform;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
  #[serde(default)]
  pub bundle: BundleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleConfig {
  /// Dependency manifest, relative to the source directory.
  pub manifest: PathBuf,

  /// Lockfile, relative to the source directory.
  pub lockfile: PathBuf,

  /// Generated client entry files copied to the artifact root.
  pub client_files: Vec<PathBuf>,

  /// Additional directories copied when present (e.g. the schema directory).
  pub extra_dirs: Vec<PathBuf>,

  /// Installed dependency tree, relative to the source directory.
  pub dependency_dir: PathBuf,

  /// Cache directories removed from the copied tree, relative to `dependency_dir`.
  pub cache_dirs: Vec<PathBuf>,

  /// Further paths removed from the copied tree, relative to `dependency_dir`.
  pub prune_paths: Vec<PathBuf>,

  /// Extension-less native binaries are recognised by these name prefixes.
  pub binary_prefixes: Vec<String>,

  /// Shell command regenerating the client after pruning. Empty disables it.
  pub generate: String,

  /// Extra environment for the generate command.
  pub env: BTreeMap<String, String>,

  /// Artifact size ceiling in bytes.
  pub size_limit_bytes: u64,

  /// Default target platform when none is given on the command line.
  pub target: Option<Platform>,
}

impl Default for BundleConfig {
  fn default() -> Self {
    Self {
      manifest: PathBuf::from("package.json"),
      lockfile: PathBuf::from("package-lock.json"),
      client_files: vec![PathBuf::from("client.js")],
      extra_dirs: vec![PathBuf::from("prisma")],
      dependency_dir: PathBuf::from("node_modules"),
      cache_dirs: vec![PathBuf::from(".cache")],
      prune_paths: vec![PathBuf::from("@prisma/engines/node_modules")],
      binary_prefixes: [
        "query-engine",
        "query_engine",
        "schema-engine",
        "migration-engine",
        "introspection-engine",
        "prisma-fmt",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
      generate: "npx prisma generate".to_string(),
      env: BTreeMap::new(),
      size_limit_bytes: DEFAULT_SIZE_LIMIT_BYTES,
      target: None,
    }
  }
}

impl ConfigFile {
  pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
    toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content, path)
  }

  /// Load `layerpack.toml` from the source directory, or defaults when absent.
  pub fn discover(source_dir: &Path) -> Result<Self, ConfigError> {
    let path = source_dir.join(CONFIG_FILENAME);
    if !path.exists() {
      debug!(path = %path.display(), "no config file, using defaults");
      return Ok(Self::default());
    }
    Self::load(&path)
  }
}
