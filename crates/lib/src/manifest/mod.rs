//! Input model: the dependency manifest and its lockfile.
//!
//! Both are read-only inputs to the bundler. The lockfile additionally
//! carries the per-package platform constraints that drive pruning.

mod lockfile;
mod package;

use std::path::PathBuf;

use thiserror::Error;

pub use lockfile::{LockedPackage, Lockfile, PlatformConstraint};
pub use package::DependencyManifest;

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("unsupported lockfile version {version} in {path} (expected 1, 2 or 3)")]
  UnsupportedLockfileVersion { path: PathBuf, version: u32 },
}
