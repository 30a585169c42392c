//! Artifact bundling.
//!
//! Turns an installed dependency tree into a self-contained artifact
//! directory for one target platform:
//!
//! 1. Copy the manifest, lockfile, client entry files and extra directories
//! 2. Copy the dependency tree
//! 3. Remove build caches and configured prune paths
//! 4. Remove packages and native binaries built for other platforms
//! 5. Regenerate the client against the pruned tree
//! 6. Check the size ceiling
//! 7. Hash and atomically move the result into the output directory
//!
//! Every step works on a staging directory next to the output. The source
//! tree is only read, and the output path never holds a partial artifact.
//!
//! # Submodules
//!
//! - [`copy`] - Tree and file copies that keep symlinks and modes
//! - [`prune`] - Cache removal and platform filtering
//! - [`generate`] - Client generation in an isolated environment

mod copy;
mod generate;
mod prune;
mod types;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::consts::BUNDLE_MARKER;
use crate::lock::DirLock;
use crate::manifest::{DependencyManifest, Lockfile};
use crate::platform::Platform;
use crate::util::hash::{dir_size, hash_directory};

pub use types::*;

const STAGING_PREFIX: &str = ".layerpack-staging-";
const PREVIOUS_PREFIX: &str = ".layerpack-previous-";
const MARKER_VERSION: u32 = 1;

/// Validated inputs, produced before anything is written.
struct Preflight {
  manifest: DependencyManifest,
  lockfile: Lockfile,
  output_dir: PathBuf,
  output_parent: PathBuf,
}

/// Bundle `source_dir` into `options.output_dir` for `target`.
///
/// Steps run strictly in order and the first failure aborts the run. On
/// failure the staging directory is removed and any previous artifact at the
/// output path is left as it was.
pub async fn bundle(source_dir: &Path, target: Platform, options: &BundleOptions) -> Result<ArtifactDirectory, BundleError> {
  let started = Instant::now();
  let config = &options.config;

  info!(source = %source_dir.display(), target = %target, "bundling");
  let preflight = preflight(source_dir, options)?;

  let unlocked = preflight.lockfile.unlocked(&preflight.manifest);
  for name in &unlocked {
    warn!(dependency = %name, "dependency missing from lockfile, lockfile may be out of date");
  }

  fs::create_dir_all(&preflight.output_parent).map_err(io_err(Step::Preflight))?;
  let lock_path = DirLock::sibling_lock_path(&preflight.output_dir);
  let _lock = DirLock::acquire(&lock_path, &preflight.output_dir, "bundle")?;

  // Re-check under the lock: another process may have written the output
  check_replaceable(&preflight.output_dir)?;

  let staging = tempfile::Builder::new()
    .prefix(STAGING_PREFIX)
    .tempdir_in(&preflight.output_parent)
    .map_err(io_err(Step::Preflight))?;
  let scratch = tempfile::Builder::new()
    .prefix("layerpack-scratch-")
    .tempdir()
    .map_err(io_err(Step::Preflight))?;
  let root = staging.path();
  debug!(staging = %root.display(), "staging directory created");

  let mut report = BundleReport {
    unlocked_dependencies: unlocked,
    ..Default::default()
  };

  // 1. Inputs
  let mut inputs = vec![config.manifest.clone(), config.lockfile.clone()];
  inputs.extend(config.client_files.iter().cloned());
  for rel in &inputs {
    copy::copy_file(&source_dir.join(rel), &root.join(rel)).map_err(io_err(Step::CopyInputs))?;
    report.files_copied += 1;
  }
  for rel in &config.extra_dirs {
    let src = source_dir.join(rel);
    if src.is_dir() {
      report.files_copied += copy::copy_tree(&src, &root.join(rel)).map_err(io_err(Step::CopyInputs))?;
    } else {
      debug!(dir = %rel.display(), "extra directory not present, skipping");
    }
  }
  info!(step = %Step::CopyInputs, files = report.files_copied, "inputs copied");

  // 2. Dependency tree
  let modules_dir = root.join(&config.dependency_dir);
  let tree_files =
    copy::copy_tree(&source_dir.join(&config.dependency_dir), &modules_dir).map_err(io_err(Step::CopyTree))?;
  report.files_copied += tree_files;
  info!(step = %Step::CopyTree, files = tree_files, "dependency tree copied");

  // 3. Caches
  let removable: Vec<PathBuf> = config.cache_dirs.iter().chain(&config.prune_paths).cloned().collect();
  report.removed_paths = prune::remove_paths(root, &modules_dir, &removable)?;
  info!(step = %Step::RemoveCaches, removed = report.removed_paths.len(), "caches removed");

  // 4. Platform prune
  let outcome = prune::prune_platforms(root, &modules_dir, &preflight.lockfile, &target, &config.binary_prefixes)?;
  report.packages_removed = outcome.packages_removed;
  report.packages = outcome.packages;

  // 5. Client generation, against the pruned tree only
  let generate_cmd = config.generate.trim();
  if options.skip_generate || generate_cmd.is_empty() {
    debug!("client generation disabled");
  } else {
    let stdout = generate::run_generate(
      generate_cmd,
      root,
      scratch.path(),
      &target,
      &config.env,
      options.shell.as_deref(),
    )
    .await?;
    report.generated = true;
    report.generate_output = (!stdout.is_empty()).then_some(stdout);
  }

  // 6. Size
  let size_bytes = dir_size(root);
  if size_bytes > config.size_limit_bytes {
    return Err(BundleError::SizeLimitExceeded {
      size_bytes,
      limit_bytes: config.size_limit_bytes,
    });
  }
  info!(step = %Step::SizeCheck, size_bytes, limit_bytes = config.size_limit_bytes, "size within limit");

  // 7. Finalize
  let content_hash = hash_directory(root, &[BUNDLE_MARKER])?;
  let marker = BundleMarker {
    version: MARKER_VERSION,
    platform: target,
    content_hash: content_hash.clone(),
    size_bytes,
  };
  let marker_json = serde_json::to_string_pretty(&marker).map_err(|e| io_err(Step::Finalize)(std::io::Error::other(e)))?;
  fs::write(root.join(BUNDLE_MARKER), marker_json).map_err(io_err(Step::Finalize))?;

  replace_output(root, &preflight.output_dir)?;

  report.duration_ms = started.elapsed().as_millis() as u64;
  info!(
    output = %preflight.output_dir.display(),
    hash = %content_hash.short(),
    size_bytes,
    binaries_kept = report.binaries_kept(),
    binaries_removed = report.binaries_removed(),
    "bundle complete"
  );

  Ok(ArtifactDirectory {
    path: preflight.output_dir,
    platform: target,
    content_hash,
    size_bytes,
    report,
  })
}

/// Read the marker `bundle` leaves in an artifact directory.
///
/// Returns `None` when the directory was not produced by `bundle` or the
/// marker cannot be parsed.
pub fn read_marker(dir: &Path) -> Option<BundleMarker> {
  let content = fs::read_to_string(dir.join(BUNDLE_MARKER)).ok()?;
  serde_json::from_str(&content).ok()
}

fn preflight(source_dir: &Path, options: &BundleOptions) -> Result<Preflight, BundleError> {
  let config = &options.config;

  if !source_dir.is_dir() {
    return Err(BundleError::MissingInput {
      what: "source directory",
      path: source_dir.to_path_buf(),
    });
  }

  let manifest_path = source_dir.join(&config.manifest);
  require_file("dependency manifest", &manifest_path)?;
  let lockfile_path = source_dir.join(&config.lockfile);
  require_file("lockfile", &lockfile_path)?;
  for client in &config.client_files {
    require_file("client entry file", &source_dir.join(client))?;
  }
  let modules_dir = source_dir.join(&config.dependency_dir);
  if !modules_dir.is_dir() {
    return Err(BundleError::MissingInput {
      what: "dependency tree",
      path: modules_dir,
    });
  }

  let manifest = DependencyManifest::load(&manifest_path)?;
  let lockfile = Lockfile::load(&lockfile_path)?;

  let (output_dir, output_parent) = resolve_output(&options.output_dir)?;
  let source = fs::canonicalize(source_dir).map_err(io_err(Step::Preflight))?;
  if output_dir.starts_with(&source) {
    return Err(BundleError::InvalidOutput {
      path: options.output_dir.clone(),
      reason: "output directory must be outside the source directory".to_string(),
    });
  }
  check_replaceable(&output_dir)?;

  debug!(
    manifest = %manifest_path.display(),
    lockfile = %lockfile_path.display(),
    lockfile_version = lockfile.lockfile_version,
    output = %output_dir.display(),
    "preflight passed"
  );

  Ok(Preflight {
    manifest,
    lockfile,
    output_dir,
    output_parent,
  })
}

fn require_file(what: &'static str, path: &Path) -> Result<(), BundleError> {
  if path.is_file() {
    Ok(())
  } else {
    Err(BundleError::MissingInput {
      what,
      path: path.to_path_buf(),
    })
  }
}

/// Absolute output path with its parent resolved through symlinks as far as
/// it exists. Nothing is created.
fn resolve_output(output: &Path) -> Result<(PathBuf, PathBuf), BundleError> {
  let invalid = |reason: &str| BundleError::InvalidOutput {
    path: output.to_path_buf(),
    reason: reason.to_string(),
  };

  let absolute = std::path::absolute(output).map_err(io_err(Step::Preflight))?;
  let name = absolute
    .file_name()
    .ok_or_else(|| invalid("output path has no directory name"))?
    .to_os_string();
  let parent = absolute.parent().ok_or_else(|| invalid("output path has no parent"))?;

  // Resolve the deepest existing ancestor, keep the rest verbatim
  let mut existing = parent.to_path_buf();
  let mut rest = Vec::new();
  while !existing.exists() {
    match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
      (Some(component), Some(up)) => {
        rest.push(component);
        existing = up.to_path_buf();
      }
      _ => break,
    }
  }
  let mut resolved_parent = fs::canonicalize(&existing).map_err(io_err(Step::Preflight))?;
  for component in rest.into_iter().rev() {
    resolved_parent.push(component);
  }

  Ok((resolved_parent.join(name), resolved_parent))
}

/// An existing output may only be replaced if it is an earlier artifact or
/// an empty directory.
fn check_replaceable(output_dir: &Path) -> Result<(), BundleError> {
  let Ok(metadata) = fs::symlink_metadata(output_dir) else {
    return Ok(());
  };

  let invalid = |reason: &str| BundleError::InvalidOutput {
    path: output_dir.to_path_buf(),
    reason: reason.to_string(),
  };

  if !metadata.is_dir() {
    return Err(invalid("path exists and is not a directory"));
  }
  if output_dir.join(BUNDLE_MARKER).is_file() {
    return Ok(());
  }
  let empty = fs::read_dir(output_dir)
    .map_err(io_err(Step::Preflight))?
    .next()
    .is_none();
  if empty {
    Ok(())
  } else {
    Err(invalid("directory is not empty and was not produced by layerpack"))
  }
}

/// Move the finished staging directory onto the output path.
///
/// A previous artifact is first moved aside next to the output and only
/// deleted once the new one is in place. If the swap fails it is moved back.
fn replace_output(staging: &Path, output_dir: &Path) -> Result<(), BundleError> {
  if fs::symlink_metadata(output_dir).is_err() {
    return fs::rename(staging, output_dir).map_err(io_err(Step::Finalize));
  }

  let parent = output_dir.parent().unwrap_or_else(|| Path::new("."));
  let aside = tempfile::Builder::new()
    .prefix(PREVIOUS_PREFIX)
    .tempdir_in(parent)
    .map_err(io_err(Step::Finalize))?;
  let previous = aside.path().join("artifact");

  debug!(output = %output_dir.display(), "replacing previous artifact");
  fs::rename(output_dir, &previous).map_err(io_err(Step::Finalize))?;

  if let Err(source) = fs::rename(staging, output_dir) {
    if let Err(restore) = fs::rename(&previous, output_dir) {
      warn!(
        previous = %previous.display(),
        error = %restore,
        "could not restore previous artifact"
      );
      // Keep the moved-aside artifact on disk rather than deleting it
      let _ = aside.keep();
    }
    return Err(BundleError::Io {
      step: Step::Finalize,
      source,
    });
  }

  // `aside` drops here and removes the previous artifact
  Ok(())
}
