//! Pruning steps: cache removal and platform filtering.
//!
//! Platform filtering works on explicit tags. Packages the lockfile marks
//! with `os` / `cpu` constraints are kept or dropped by those constraints.
//! Inside each remaining package, native binaries are tagged from their own
//! name or the nearest tagged directory above them, and every binary whose
//! tag names another platform is deleted.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::types::{BundleError, PackagePrune, RemovalReason, RemovedPackage, Step, io_err};
use crate::manifest::Lockfile;
use crate::platform::{Platform, PlatformTag, resolve_implicit_arch};

/// Extensions that mark a file as a native binary.
const NATIVE_SUFFIXES: &[&str] = &[".node", ".so", ".dylib", ".dll", ".exe"];

/// Directories under a modules directory that never hold packages.
const NON_PACKAGE_DIRS: &[&str] = &[".bin", ".cache"];

/// An installed package found in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstalledPackage {
  /// Path relative to the artifact root, `/`-separated, as keyed in the lockfile.
  pub install_path: String,
  pub dir: PathBuf,
}

impl InstalledPackage {
  /// Last path segment, e.g. `darwin-arm64` for `node_modules/@esbuild/darwin-arm64`.
  fn leaf_name(&self) -> &str {
    self.install_path.rsplit('/').next().unwrap_or(&self.install_path)
  }
}

pub(crate) struct PruneOutcome {
  pub packages_removed: Vec<RemovedPackage>,
  pub packages: Vec<PackagePrune>,
}

/// Remove `paths` (relative to `base`) if present. Returns the removed paths
/// relative to `root`.
pub(crate) fn remove_paths(root: &Path, base: &Path, paths: &[PathBuf]) -> Result<Vec<String>, BundleError> {
  let mut removed = Vec::new();

  for rel in paths {
    let path = base.join(rel);
    let Ok(metadata) = fs::symlink_metadata(&path) else {
      continue;
    };

    if metadata.is_dir() {
      fs::remove_dir_all(&path).map_err(io_err(Step::RemoveCaches))?;
    } else {
      fs::remove_file(&path).map_err(io_err(Step::RemoveCaches))?;
    }

    let shown = relative(root, &path);
    debug!(path = %shown, "removed");
    removed.push(shown);
  }

  Ok(removed)
}

/// Whether a file name denotes a native binary.
pub(crate) fn is_native_binary(name: &str, binary_prefixes: &[String]) -> bool {
  let lower = name.to_ascii_lowercase();
  NATIVE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
    || lower.contains(".so.")
    || binary_prefixes.iter().any(|prefix| lower.starts_with(prefix.as_str()))
}

/// Find every package below `modules_dir`, including scoped packages
/// (`@scope/name`), dot-scopes holding generated packages (`.prisma/client`)
/// and nested `node_modules`. Sorted by install path.
pub(crate) fn discover_packages(root: &Path, modules_dir: &Path) -> io::Result<Vec<InstalledPackage>> {
  let mut packages = Vec::new();
  collect_packages(root, modules_dir, &mut packages)?;
  packages.sort_by(|a, b| a.install_path.cmp(&b.install_path));
  Ok(packages)
}

fn collect_packages(root: &Path, modules_dir: &Path, out: &mut Vec<InstalledPackage>) -> io::Result<()> {
  if !modules_dir.is_dir() {
    return Ok(());
  }

  for entry in sorted_dirs(modules_dir)? {
    let name = entry.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    if NON_PACKAGE_DIRS.contains(&name.as_str()) {
      continue;
    }

    if name.starts_with('@') || name.starts_with('.') {
      for pkg in sorted_dirs(&entry)? {
        push_package(root, pkg, out)?;
      }
    } else {
      push_package(root, entry, out)?;
    }
  }

  Ok(())
}

fn push_package(root: &Path, dir: PathBuf, out: &mut Vec<InstalledPackage>) -> io::Result<()> {
  let nested = dir.join("node_modules");
  out.push(InstalledPackage {
    install_path: relative(root, &dir),
    dir,
  });
  collect_packages(root, &nested, out)
}

/// Real directories directly inside `dir` (symlinked packages are skipped).
fn sorted_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
  let mut dirs = Vec::new();
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    if entry.file_type()?.is_dir() {
      dirs.push(entry.path());
    }
  }
  dirs.sort();
  Ok(dirs)
}

/// Native binaries inside one package, not descending into nested packages.
fn native_binaries(dir: &Path, binary_prefixes: &[String]) -> Vec<PathBuf> {
  WalkDir::new(dir)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.depth() == 0 || e.file_name() != "node_modules")
    .filter_map(|e| e.ok())
    .filter(|e| e.file_type().is_file())
    .filter(|e| is_native_binary(&e.file_name().to_string_lossy(), binary_prefixes))
    .map(|e| e.into_path())
    .collect()
}

/// Tag of a binary: its own name, else the closest tagged directory between
/// it and the package root.
fn binary_tag(package_dir: &Path, binary: &Path) -> PlatformTag {
  let rel = binary.strip_prefix(package_dir).unwrap_or(binary);
  rel
    .components()
    .rev()
    .map(|c| PlatformTag::from_name(&c.as_os_str().to_string_lossy()))
    .find(PlatformTag::is_platform_specific)
    .unwrap_or_default()
}

/// Drop everything in the dependency tree that targets another platform.
///
/// Fails with [`BundleError::NoMatchingPlatform`] when a package that
/// shipped platform-tagged binaries keeps none for `target`.
pub(crate) fn prune_platforms(
  root: &Path,
  modules_dir: &Path,
  lockfile: &Lockfile,
  target: &Platform,
  binary_prefixes: &[String],
) -> Result<PruneOutcome, BundleError> {
  let packages = discover_packages(root, modules_dir).map_err(io_err(Step::Prune))?;
  debug!(count = packages.len(), "discovered packages");

  let mut packages_removed: Vec<RemovedPackage> = Vec::new();
  let mut kept_constrained: Vec<String> = Vec::new();
  let mut pruned = Vec::new();

  for package in &packages {
    let inside_removed = packages_removed
      .iter()
      .any(|removed| package.install_path.starts_with(&format!("{}/", removed.install_path)));
    if inside_removed {
      continue;
    }

    let binaries = native_binaries(&package.dir, binary_prefixes);

    let removal = match lockfile.constraint_for(&package.install_path) {
      Some(constraint) if !constraint.matches(target) => Some((constraint.tag(), RemovalReason::LockfileConstraint)),
      Some(_) => {
        kept_constrained.push(package.install_path.clone());
        None
      }
      None => {
        let name_tag = PlatformTag::from_name(package.leaf_name());
        let foreign = name_tag.is_platform_specific() && !name_tag.matches(target);
        (foreign && !binaries.is_empty()).then_some((name_tag, RemovalReason::PackageName))
      }
    };

    if let Some((tag, reason)) = removal {
      fs::remove_dir_all(&package.dir).map_err(io_err(Step::Prune))?;
      debug!(package = %package.install_path, %tag, ?reason, "removed package");
      packages_removed.push(RemovedPackage {
        install_path: package.install_path.clone(),
        tag,
        reason,
      });
      continue;
    }

    let mut report = PackagePrune {
      install_path: package.install_path.clone(),
      ..Default::default()
    };

    let (binaries, mut tags): (Vec<PathBuf>, Vec<PlatformTag>) = binaries
      .into_iter()
      .map(|binary| {
        let tag = binary_tag(&package.dir, &binary);
        (binary, tag)
      })
      .filter(|(_, tag)| tag.is_platform_specific())
      .unzip();
    resolve_implicit_arch(&mut tags);

    for (binary, tag) in binaries.into_iter().zip(tags) {
      report.found.insert(tag);

      let shown = relative(root, &binary);
      if tag.matches(target) {
        report.kept.push(shown);
      } else {
        fs::remove_file(&binary).map_err(io_err(Step::Prune))?;
        remove_empty_parents(&binary, &package.dir);
        debug!(path = %shown, %tag, "removed binary");
        report.removed.push(shown);
      }
    }

    if !report.found.is_empty() {
      pruned.push(report);
    }
  }

  if let Some(empty) = pruned.iter().find(|p| p.kept.is_empty()) {
    return Err(BundleError::NoMatchingPlatform {
      package: empty.install_path.clone(),
      target: *target,
      found: describe_tags(&empty.found),
    });
  }

  if let Some((family, found)) = emptied_family(&packages_removed, &kept_constrained) {
    return Err(BundleError::NoMatchingPlatform {
      package: family,
      target: *target,
      found: describe_tags(&found),
    });
  }

  info!(
    packages_removed = packages_removed.len(),
    binaries_removed = pruned.iter().map(|p| p.removed.len()).sum::<usize>(),
    binaries_kept = pruned.iter().map(|p| p.kept.len()).sum::<usize>(),
    "platform prune complete"
  );

  Ok(PruneOutcome {
    packages_removed,
    packages: pruned,
  })
}

/// A scope (`node_modules/@esbuild`) whose platform packages were all
/// removed by lockfile constraints, leaving no build for the target.
///
/// Unscoped platform-only packages (`fsevents`) are optional extras and may
/// disappear entirely.
fn emptied_family(removed: &[RemovedPackage], kept_constrained: &[String]) -> Option<(String, BTreeSet<PlatformTag>)> {
  let mut families: BTreeMap<&str, BTreeSet<PlatformTag>> = BTreeMap::new();
  for package in removed.iter().filter(|p| p.reason == RemovalReason::LockfileConstraint) {
    if let Some(scope) = scope_of(&package.install_path) {
      families.entry(scope).or_default().insert(package.tag);
    }
  }

  families
    .into_iter()
    .find(|(scope, _)| !kept_constrained.iter().any(|kept| scope_of(kept) == Some(*scope)))
    .map(|(scope, found)| (scope.to_string(), found))
}

fn scope_of(install_path: &str) -> Option<&str> {
  let (parent, _) = install_path.rsplit_once('/')?;
  let scope = parent.rsplit('/').next()?;
  scope.starts_with('@').then_some(parent)
}

fn describe_tags(tags: &BTreeSet<PlatformTag>) -> String {
  tags.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Remove directories left empty by a deletion, stopping at `stop`.
fn remove_empty_parents(path: &Path, stop: &Path) {
  let mut current = path.parent();
  while let Some(dir) = current {
    if dir == stop || !dir.starts_with(stop) {
      break;
    }
    // Fails on non-empty directories, which ends the walk
    if fs::remove_dir(dir).is_err() {
      break;
    }
    current = dir.parent();
  }
}

/// `path` relative to `root`, with `/` separators.
pub(crate) fn relative(root: &Path, path: &Path) -> String {
  path
    .strip_prefix(root)
    .unwrap_or(path)
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}
