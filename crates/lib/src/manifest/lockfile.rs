use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{DependencyManifest, ManifestError};
use crate::platform::{Os, Platform, PlatformTag};

/// Exact resolved versions (`package-lock.json`).
///
/// Lockfile versions 2 and 3 list every installed package under `packages`,
/// keyed by install path (`node_modules/@prisma/engines`). Version 1 only has
/// the nested `dependencies` tree and carries no platform constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
  #[serde(default = "default_lockfile_version")]
  pub lockfile_version: u32,

  #[serde(default)]
  pub packages: BTreeMap<String, LockedPackage>,

  #[serde(default)]
  pub dependencies: BTreeMap<String, serde_json::Value>,
}

fn default_lockfile_version() -> u32 {
  1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPackage {
  #[serde(default)]
  pub version: Option<String>,

  #[serde(default)]
  pub os: Vec<String>,

  #[serde(default)]
  pub cpu: Vec<String>,

  #[serde(default)]
  pub optional: bool,

  #[serde(default)]
  pub dev: bool,
}

impl LockedPackage {
  pub fn constraint(&self) -> PlatformConstraint {
    PlatformConstraint {
      os: self.os.clone(),
      cpu: self.cpu.clone(),
    }
  }
}

/// The `os` / `cpu` restriction npm records for a package.
///
/// Entries use npm's names (`darwin`, `win32`, `x64`, `arm64`) and may be
/// negated with a leading `!`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformConstraint {
  pub os: Vec<String>,
  pub cpu: Vec<String>,
}

impl PlatformConstraint {
  pub fn is_constrained(&self) -> bool {
    !self.os.is_empty() || !self.cpu.is_empty()
  }

  pub fn matches(&self, target: &Platform) -> bool {
    list_allows(&self.os, target.os.npm_name()) && list_allows(&self.cpu, target.arch.as_str())
  }

  /// Best-effort tag for reporting. Unknown npm names yield an untagged part.
  pub fn tag(&self) -> PlatformTag {
    let first_positive = |list: &[String]| list.iter().find(|v| !v.starts_with('!')).cloned();
    PlatformTag {
      os: first_positive(&self.os).and_then(|os| Os::from_token(&os)),
      arch: first_positive(&self.cpu).and_then(|cpu| crate::platform::Arch::from_token(&cpu)),
    }
  }
}

fn list_allows(list: &[String], value: &str) -> bool {
  if list.is_empty() {
    return true;
  }
  if list.iter().any(|v| v.strip_prefix('!') == Some(value)) {
    return false;
  }
  let mut positives = list.iter().filter(|v| !v.starts_with('!')).peekable();
  if positives.peek().is_none() {
    return true;
  }
  positives.any(|v| v == value)
}

impl Lockfile {
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let lockfile: Lockfile = serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    if !(1..=3).contains(&lockfile.lockfile_version) {
      return Err(ManifestError::UnsupportedLockfileVersion {
        path: path.to_path_buf(),
        version: lockfile.lockfile_version,
      });
    }

    Ok(lockfile)
  }

  /// Platform constraint for the package installed at `install_path`
  /// (relative to the artifact root, `/`-separated), if it has one.
  pub fn constraint_for(&self, install_path: &str) -> Option<PlatformConstraint> {
    self
      .packages
      .get(install_path)
      .map(LockedPackage::constraint)
      .filter(PlatformConstraint::is_constrained)
  }

  /// Manifest dependencies that have no entry in this lockfile.
  pub fn unlocked(&self, manifest: &DependencyManifest) -> Vec<String> {
    manifest
      .dependencies
      .keys()
      .chain(manifest.dev_dependencies.keys())
      .filter(|name| {
        let install_path = format!("node_modules/{}", name);
        !self.packages.contains_key(&install_path) && !self.dependencies.contains_key(*name)
      })
      .cloned()
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::Arch;
  use tempfile::TempDir;

  const LOCK_V3: &str = r#"{
    "name": "prisma-layer",
    "lockfileVersion": 3,
    "requires": true,
    "packages": {
      "": { "dependencies": { "@prisma/client": "^4.8.0" } },
      "node_modules/@prisma/client": { "version": "4.8.0" },
      "node_modules/@prisma/engines": { "version": "4.8.0", "hasInstallScript": true },
      "node_modules/@esbuild/darwin-arm64": { "version": "0.17.0", "os": ["darwin"], "cpu": ["arm64"], "optional": true },
      "node_modules/@esbuild/linux-x64": { "version": "0.17.0", "os": ["linux"], "cpu": ["x64"], "optional": true },
      "node_modules/fsevents": { "version": "2.3.2", "os": ["darwin"], "optional": true, "dev": true }
    }
  }"#;

  fn write_lock(content: &str) -> (TempDir, Lockfile) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("package-lock.json");
    std::fs::write(&path, content).unwrap();
    let lock = Lockfile::load(&path).unwrap();
    (temp, lock)
  }

  #[test]
  fn parses_v3_packages() {
    let (_temp, lock) = write_lock(LOCK_V3);
    assert_eq!(lock.lockfile_version, 3);
    assert_eq!(lock.packages["node_modules/@prisma/client"].version.as_deref(), Some("4.8.0"));
    assert!(lock.packages["node_modules/fsevents"].dev);
  }

  #[test]
  fn constraint_only_for_platform_packages() {
    let (_temp, lock) = write_lock(LOCK_V3);
    assert!(lock.constraint_for("node_modules/@prisma/client").is_none());

    let constraint = lock.constraint_for("node_modules/@esbuild/darwin-arm64").unwrap();
    assert_eq!(
      constraint.tag(),
      PlatformTag {
        os: Some(Os::MacOs),
        arch: Some(Arch::Aarch64)
      }
    );
    assert!(lock.constraint_for("node_modules/@esbuild/linux-x64").is_some());
  }

  #[test]
  fn constraint_matching_uses_npm_names() {
    let linux = Platform::new(Os::Linux, Arch::X86_64);
    let windows = Platform::new(Os::Windows, Arch::X86_64);

    let win_only = PlatformConstraint {
      os: vec!["win32".into()],
      cpu: vec![],
    };
    assert!(win_only.matches(&windows));
    assert!(!win_only.matches(&linux));

    let not_win = PlatformConstraint {
      os: vec!["!win32".into()],
      cpu: vec![],
    };
    assert!(not_win.matches(&linux));
    assert!(!not_win.matches(&windows));

    let arm_only = PlatformConstraint {
      os: vec![],
      cpu: vec!["arm64".into()],
    };
    assert!(!arm_only.matches(&linux));
  }

  #[test]
  fn unlocked_reports_missing_dependencies() {
    let (_temp, lock) = write_lock(LOCK_V3);
    let manifest: DependencyManifest =
      serde_json::from_str(r#"{ "dependencies": { "@prisma/client": "^4", "zod": "^3" } }"#).unwrap();
    assert_eq!(lock.unlocked(&manifest), vec!["zod".to_string()]);
  }

  #[test]
  fn v1_lockfile_uses_dependency_tree() {
    let (_temp, lock) = write_lock(r#"{ "lockfileVersion": 1, "dependencies": { "zod": { "version": "3.0.0" } } }"#);
    let manifest: DependencyManifest = serde_json::from_str(r#"{ "dependencies": { "zod": "^3" } }"#).unwrap();
    assert!(lock.unlocked(&manifest).is_empty());
    assert!(lock.constraint_for("node_modules/zod").is_none());
  }

  #[test]
  fn rejects_unknown_lockfile_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("package-lock.json");
    std::fs::write(&path, r#"{ "lockfileVersion": 9 }"#).unwrap();
    assert!(matches!(
      Lockfile::load(&path),
      Err(ManifestError::UnsupportedLockfileVersion { version: 9, .. })
    ));
  }
}
