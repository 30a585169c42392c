//! Write protection for published layer versions.
//!
//! Once a layer version is written it is never modified again; its directory
//! is made read-only so that accidental edits fail loudly.
//!
//! ## Platform Behavior
//!
//! - **Unix**: Sets permissions to 0444 (files) or 0555 (dirs/executables)
//! - **Windows**: Sets the read-only attribute on files

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, thiserror::Error)]
pub enum ImmutableError {
  #[error("failed to set permissions on {path}: {source}")]
  SetPermissions {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read metadata for {path}: {source}")]
  Metadata {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to traverse directory {path}: {source}")]
  WalkDir {
    path: String,
    #[source]
    source: walkdir::Error,
  },
}

/// Recursively remove write permissions from `path`.
///
/// Entries that cannot be changed are logged and skipped.
pub fn make_immutable(path: &Path) -> Result<(), ImmutableError> {
  if !path.exists() {
    return Ok(());
  }

  debug!(path = ?path, "making path read-only");

  // Post-order so directories are locked after their contents
  for entry in WalkDir::new(path).contents_first(true) {
    let entry = entry.map_err(|e| ImmutableError::WalkDir {
      path: path.display().to_string(),
      source: e,
    })?;

    if entry.path_is_symlink() {
      continue;
    }

    if let Err(e) = set_writable(entry.path(), false) {
      warn!(path = ?entry.path(), error = %e, "failed to make read-only, continuing");
    }
  }

  Ok(())
}

/// Restore write permissions so `path` can be removed.
pub fn make_mutable(path: &Path) -> Result<(), ImmutableError> {
  if !path.exists() {
    return Ok(());
  }

  debug!(path = ?path, "making path writable");

  // Pre-order so directories are unlocked before we descend
  for entry in WalkDir::new(path) {
    let entry = entry.map_err(|e| ImmutableError::WalkDir {
      path: path.display().to_string(),
      source: e,
    })?;

    if entry.path_is_symlink() {
      continue;
    }

    if let Err(e) = set_writable(entry.path(), true) {
      warn!(path = ?entry.path(), error = %e, "failed to make writable, continuing");
    }
  }

  Ok(())
}

#[cfg(unix)]
fn set_writable(path: &Path, writable: bool) -> Result<(), ImmutableError> {
  use std::os::unix::fs::PermissionsExt;

  let metadata = std::fs::metadata(path).map_err(|e| ImmutableError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;

  let executable = metadata.is_dir() || (metadata.permissions().mode() & 0o111 != 0);
  let new_mode = match (writable, executable) {
    (false, true) => 0o555,
    (false, false) => 0o444,
    (true, true) => 0o755,
    (true, false) => 0o644,
  };

  let mut perms = metadata.permissions();
  perms.set_mode(new_mode);
  std::fs::set_permissions(path, perms).map_err(|e| ImmutableError::SetPermissions {
    path: path.display().to_string(),
    source: e,
  })
}

#[cfg(windows)]
fn set_writable(path: &Path, writable: bool) -> Result<(), ImmutableError> {
  let metadata = std::fs::metadata(path).map_err(|e| ImmutableError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;

  // The read-only attribute on a directory does not protect its contents
  if metadata.is_dir() {
    return Ok(());
  }

  let mut perms = metadata.permissions();
  perms.set_readonly(!writable);
  std::fs::set_permissions(path, perms).map_err(|e| ImmutableError::SetPermissions {
    path: path.display().to_string(),
    source: e,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  #[test]
  fn immutable_then_mutable_round_trip() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("v1");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("layer.json"), "{}").unwrap();

    make_immutable(&dir).unwrap();
    assert!(fs::metadata(dir.join("layer.json")).unwrap().permissions().readonly());

    make_mutable(&dir).unwrap();
    assert!(!fs::metadata(dir.join("layer.json")).unwrap().permissions().readonly());
    fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  #[cfg(unix)]
  fn executables_keep_execute_bit() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("engine");
    fs::write(&bin, "#!/bin/sh").unwrap();
    fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();

    make_immutable(temp.path()).unwrap();
    assert_eq!(fs::metadata(&bin).unwrap().permissions().mode() & 0o777, 0o555);
    make_mutable(temp.path()).unwrap();
  }

  #[test]
  fn missing_path_is_ok() {
    let temp = TempDir::new().unwrap();
    assert!(make_immutable(&temp.path().join("absent")).is_ok());
  }
}
