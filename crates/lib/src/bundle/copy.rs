//! Copy steps: top-level inputs and the dependency tree.
//!
//! Copies keep symlinks as symlinks and preserve permission bits, so the
//! artifact behaves like the installed tree (`node_modules/.bin` relies on
//! both).

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

/// Copy one file, creating parent directories as needed.
pub(crate) fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
  if let Some(parent) = dst.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::copy(src, dst)?;
  Ok(())
}

/// Recursively copy `src` into `dst`. Returns the number of files and
/// symlinks written.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> io::Result<usize> {
  let mut copied = 0;

  for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(rel);
    let file_type = entry.file_type();

    if file_type.is_symlink() {
      let link = fs::read_link(entry.path())?;
      if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
      }
      create_symlink(&link, &target, entry.path())?;
      copied += 1;
    } else if file_type.is_dir() {
      fs::create_dir_all(&target)?;
    } else if file_type.is_file() {
      fs::copy(entry.path(), &target)?;
      copied += 1;
    } else {
      debug!(path = %entry.path().display(), "skipping special file");
    }
  }

  Ok(copied)
}

#[cfg(unix)]
fn create_symlink(link: &Path, target: &Path, _original: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(link, target)
}

#[cfg(windows)]
fn create_symlink(link: &Path, target: &Path, original: &Path) -> io::Result<()> {
  if fs::metadata(original).map(|m| m.is_dir()).unwrap_or(false) {
    std::os::windows::fs::symlink_dir(link, target)
  } else {
    std::os::windows::fs::symlink_file(link, target)
  }
}
