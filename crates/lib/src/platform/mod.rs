pub mod arch;
pub mod immutable;
pub mod os;
pub mod paths;
pub mod tag;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub use arch::Arch;
pub use os::Os;
pub use tag::{PlatformTag, resolve_implicit_arch};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
  #[error("unknown operating system '{0}' (expected linux, darwin, windows or freebsd)")]
  UnknownOs(String),

  #[error("unknown architecture '{0}' (expected x64, arm64, ia32 or arm)")]
  UnknownArch(String),

  #[error("invalid platform identifier '{0}' (expected <os>-<arch>, e.g. linux-x64)")]
  Malformed(String),
}

/// Platform identifier combining OS and architecture (e.g., "linux-x64")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
}

impl Platform {
  /// Create a new platform identifier
  pub fn new(os: Os, arch: Arch) -> Self {
    Self { os, arch }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      os: Os::current()?,
      arch: Arch::current()?,
    })
  }

  /// Returns the platform identifier string (e.g., "darwin-arm64")
  pub fn identifier(&self) -> String {
    format!("{}-{}", self.os, self.arch)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.identifier())
  }
}

impl FromStr for Platform {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.trim().to_ascii_lowercase().replace("x86_64", "x64");
    let (os, arch) = normalized
      .split_once('-')
      .ok_or_else(|| PlatformError::Malformed(s.to_string()))?;
    if os.is_empty() || arch.is_empty() {
      return Err(PlatformError::Malformed(s.to_string()));
    }
    Ok(Self::new(os.parse()?, arch.parse()?))
  }
}

impl Serialize for Platform {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.identifier())
  }
}

impl<'de> Deserialize<'de> for Platform {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}
