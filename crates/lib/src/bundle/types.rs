//! Types for the bundle pipeline: errors, options, and the produced artifact.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BundleConfig;
use crate::lock::LockError;
use crate::manifest::ManifestError;
use crate::platform::{Platform, PlatformTag};
use crate::util::hash::{ContentHash, DirHashError};

/// Pipeline step, used to say where a bundle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
  Preflight,
  CopyInputs,
  CopyTree,
  RemoveCaches,
  Prune,
  Generate,
  SizeCheck,
  Finalize,
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Step::Preflight => "preflight",
      Step::CopyInputs => "copy inputs",
      Step::CopyTree => "copy dependency tree",
      Step::RemoveCaches => "remove caches",
      Step::Prune => "platform prune",
      Step::Generate => "client generation",
      Step::SizeCheck => "size check",
      Step::Finalize => "finalize",
    };
    write!(f, "{}", name)
  }
}

/// Errors that abort a bundle. None of them are retried.
#[derive(Debug, Error)]
pub enum BundleError {
  /// Manifest, lockfile, client entry or dependency tree absent.
  #[error("preflight: {what} not found at {path}")]
  MissingInput { what: &'static str, path: PathBuf },

  /// Manifest or lockfile present but unreadable.
  #[error("preflight: {0}")]
  InvalidInput(#[from] ManifestError),

  #[error("preflight: cannot write artifact to {path}: {reason}")]
  InvalidOutput { path: PathBuf, reason: String },

  /// A dependency shipped platform binaries but none for the target survived.
  #[error("platform prune: {package} has no {target} binaries (found: {found})")]
  NoMatchingPlatform {
    package: String,
    target: Platform,
    found: String,
  },

  /// The generate command exited non-zero. `output` holds its stderr and stdout.
  #[error("client generation: `{cmd}` failed with exit code {code:?}\n{output}")]
  ClientGeneration {
    cmd: String,
    code: Option<i32>,
    output: String,
  },

  #[error("size check: artifact is {size_bytes} bytes, limit is {limit_bytes} bytes")]
  SizeLimitExceeded { size_bytes: u64, limit_bytes: u64 },

  #[error(transparent)]
  Locked(#[from] LockError),

  #[error("{step}: {source}")]
  Io {
    step: Step,
    #[source]
    source: io::Error,
  },

  #[error("finalize: {0}")]
  Hash(#[from] DirHashError),
}

impl BundleError {
  /// The pipeline step that failed.
  pub fn step(&self) -> Step {
    match self {
      BundleError::MissingInput { .. }
      | BundleError::InvalidInput(_)
      | BundleError::InvalidOutput { .. }
      | BundleError::Locked(_) => Step::Preflight,
      BundleError::NoMatchingPlatform { .. } => Step::Prune,
      BundleError::ClientGeneration { .. } => Step::Generate,
      BundleError::SizeLimitExceeded { .. } => Step::SizeCheck,
      BundleError::Io { step, .. } => *step,
      BundleError::Hash(_) => Step::Finalize,
    }
  }
}

/// Map an io error onto the step it happened in.
pub(crate) fn io_err(step: Step) -> impl FnOnce(io::Error) -> BundleError {
  move |source| BundleError::Io { step, source }
}

/// Inputs to one bundle run beyond the source directory and target.
#[derive(Debug, Clone)]
pub struct BundleOptions {
  pub config: BundleConfig,

  /// Directory the artifact is written to. Replaced atomically on success.
  pub output_dir: PathBuf,

  /// Skip the client generation step regardless of configuration.
  pub skip_generate: bool,

  /// Shell override for the generate command.
  pub shell: Option<String>,
}

impl BundleOptions {
  pub fn new(config: BundleConfig, output_dir: impl Into<PathBuf>) -> Self {
    Self {
      config,
      output_dir: output_dir.into(),
      skip_generate: false,
      shell: None,
    }
  }
}

/// Why a whole package was dropped from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalReason {
  /// The lockfile's `os` / `cpu` constraint excludes the target.
  LockfileConstraint,
  /// The package name names another platform and it ships binaries.
  PackageName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedPackage {
  pub install_path: String,
  pub tag: PlatformTag,
  pub reason: RemovalReason,
}

/// Outcome of pruning the binaries inside one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackagePrune {
  pub install_path: String,
  /// Every platform tag seen on a binary in this package before pruning.
  pub found: BTreeSet<PlatformTag>,
  /// Binaries kept, relative to the artifact root.
  pub kept: Vec<String>,
  /// Binaries removed, relative to the artifact root.
  pub removed: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BundleReport {
  pub files_copied: usize,
  /// Cache and configured prune paths removed, relative to the artifact root.
  pub removed_paths: Vec<String>,
  pub packages_removed: Vec<RemovedPackage>,
  /// Packages that shipped platform-tagged binaries.
  pub packages: Vec<PackagePrune>,
  pub unlocked_dependencies: Vec<String>,
  pub generated: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub generate_output: Option<String>,
  pub duration_ms: u64,
}

impl BundleReport {
  pub fn binaries_removed(&self) -> usize {
    self.packages.iter().map(|p| p.removed.len()).sum()
  }

  pub fn binaries_kept(&self) -> usize {
    self.packages.iter().map(|p| p.kept.len()).sum()
  }
}

/// A finished artifact directory.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactDirectory {
  pub path: PathBuf,
  pub platform: Platform,
  pub content_hash: ContentHash,
  pub size_bytes: u64,
  pub report: BundleReport,
}

/// Contents of the marker file written into each artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMarker {
  pub version: u32,
  pub platform: Platform,
  pub content_hash: ContentHash,
  pub size_bytes: u64,
}
