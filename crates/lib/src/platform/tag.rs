//! Platform affinity tags for installed artifacts.
//!
//! A tag records which OS (and optionally which architecture) an entry in the
//! dependency tree was built for. Tags come either from lockfile constraints
//! or from [`PlatformTag::from_name`], which classifies whole name segments
//! rather than searching for substrings.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Arch, Os, Platform};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlatformTag {
  pub os: Option<Os>,
  pub arch: Option<Arch>,
}

impl PlatformTag {
  /// Classify an entry name such as `libquery_engine-darwin-arm64.dylib.node`.
  ///
  /// The name is lowercased, `x86_64` is folded to `x64` so the underscore
  /// split keeps it whole, then each segment between `-`, `_`, `.` and `@`
  /// is compared against the known OS and architecture tokens. The first
  /// OS token and the first architecture token win.
  pub fn from_name(name: &str) -> Self {
    let normalized = name.to_ascii_lowercase().replace("x86_64", "x64").replace("x86-64", "x64");

    let mut tag = Self::default();
    for segment in normalized.split(['-', '_', '.', '@', '/']) {
      if segment.is_empty() {
        continue;
      }
      if tag.os.is_none()
        && let Some(os) = Os::from_token(segment)
      {
        tag.os = Some(os);
        continue;
      }
      if tag.arch.is_none()
        && let Some(arch) = Arch::from_token(segment)
      {
        tag.arch = Some(arch);
      }
    }
    tag
  }

  /// Whether this entry belongs to one particular operating system.
  ///
  /// An architecture without an OS (`arm64/`) is not enough to call an
  /// entry platform specific.
  pub fn is_platform_specific(&self) -> bool {
    self.os.is_some()
  }

  /// Whether an entry carrying this tag may stay in an artifact for `target`.
  ///
  /// Untagged entries are platform neutral. An unspecified architecture is
  /// compatible with every architecture of the tagged OS.
  pub fn matches(&self, target: &Platform) -> bool {
    match self.os {
      None => true,
      Some(os) => os == target.os && self.arch.is_none_or(|arch| arch == target.arch),
    }
  }
}

/// Architecture of a build whose name leaves it implicit. Prisma names its
/// x64 engines `debian-openssl-*`, `rhel-openssl-*` or `darwin` and only
/// spells out the architecture for arm64 builds.
pub const IMPLICIT_ARCH: Arch = Arch::X86_64;

/// Give arch-less tags the implicit architecture when another tag for the
/// same OS names one.
///
/// A package shipping `debian-openssl` next to `linux-arm64-openssl` holds
/// two Linux builds, so the arch-less one is the x64 build. An OS with only
/// arch-less tags keeps matching every architecture.
pub fn resolve_implicit_arch(tags: &mut [PlatformTag]) {
  let spelled: Vec<Os> = tags
    .iter()
    .filter(|t| t.arch.is_some())
    .filter_map(|t| t.os)
    .collect();

  for tag in tags.iter_mut() {
    if tag.arch.is_none()
      && let Some(os) = tag.os
      && spelled.contains(&os)
    {
      tag.arch = Some(IMPLICIT_ARCH);
    }
  }
}

impl fmt::Display for PlatformTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.os, self.arch) {
      (Some(os), Some(arch)) => write!(f, "{}-{}", os, arch),
      (Some(os), None) => write!(f, "{}", os),
      (None, Some(arch)) => write!(f, "*-{}", arch),
      (None, None) => write!(f, "untagged"),
    }
  }
}
