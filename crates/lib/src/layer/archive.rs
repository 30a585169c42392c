//! Deterministic zip archives of artifact directories.
//!
//! Entries are written in sorted path order with the zip epoch as their
//! timestamp, so the same directory always produces the same bytes.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::types::LayerError;

/// Write `source` into a zip at `dest`, skipping entries named in `exclude`.
///
/// Every entry is placed under `prefix/` when a prefix is given. Returns the
/// number of files and symlinks written.
pub fn write_archive(source: &Path, dest: &Path, prefix: Option<&str>, exclude: &[&str]) -> Result<usize, LayerError> {
  let io_at = |path: &Path| {
    let path = path.to_path_buf();
    move |source: io::Error| LayerError::Io { path, source }
  };

  let file = File::create(dest).map_err(io_at(dest))?;
  let mut zip = ZipWriter::new(file);
  let prefix = prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty());
  let mut written = 0;

  let walker = WalkDir::new(source)
    .follow_links(false)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| {
      e.file_name()
        .to_str()
        .map(|name| !exclude.contains(&name))
        .unwrap_or(true)
    });

  for entry in walker {
    let entry = entry.map_err(|e| LayerError::Io {
      path: source.to_path_buf(),
      source: io::Error::other(e),
    })?;

    let rel = entry
      .path()
      .strip_prefix(source)
      .unwrap_or(entry.path())
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    if rel.is_empty() {
      continue;
    }
    let name = match prefix {
      Some(prefix) => format!("{}/{}", prefix, rel),
      None => rel,
    };

    let file_type = entry.file_type();
    let metadata = fs::symlink_metadata(entry.path()).map_err(io_at(entry.path()))?;
    let options = entry_options(unix_mode(&metadata, file_type.is_dir()));

    if file_type.is_symlink() {
      let target = fs::read_link(entry.path()).map_err(io_at(entry.path()))?;
      let target = target.to_string_lossy().replace('\\', "/");
      zip.add_symlink(name, target, options)?;
      written += 1;
    } else if file_type.is_dir() {
      zip.add_directory(format!("{}/", name), options)?;
    } else if file_type.is_file() {
      let content = fs::read(entry.path()).map_err(io_at(entry.path()))?;
      zip.start_file(name, options)?;
      zip.write_all(&content).map_err(io_at(entry.path()))?;
      written += 1;
    }
  }

  zip.finish()?;
  debug!(archive = %dest.display(), entries = written, "archive written");
  Ok(written)
}

fn entry_options(mode: u32) -> SimpleFileOptions {
  SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(DateTime::default())
    .unix_permissions(mode)
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata, _is_dir: bool) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn unix_mode(metadata: &fs::Metadata, is_dir: bool) -> u32 {
  match (is_dir, metadata.permissions().readonly()) {
    (true, _) => 0o755,
    (false, true) => 0o444,
    (false, false) => 0o644,
  }
}
