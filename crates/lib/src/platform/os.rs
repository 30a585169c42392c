use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// Operating system families a dependency tree may ship binaries for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Os {
  #[serde(rename = "linux")]
  Linux,
  #[serde(rename = "darwin")]
  MacOs,
  #[serde(rename = "windows")]
  Windows,
  #[serde(rename = "freebsd")]
  FreeBsd,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      "freebsd" => Some(Self::FreeBsd),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
      Self::FreeBsd => "freebsd",
    }
  }

  /// Returns the identifier npm uses in `os` constraints (`process.platform`)
  pub fn npm_name(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "win32",
      Self::FreeBsd => "freebsd",
    }
  }

  /// Classify a single name segment as an OS token.
  ///
  /// Linux distribution names count as Linux since engine packages name
  /// their Linux builds after the distro (`debian-openssl-3.0.x`).
  pub fn from_token(token: &str) -> Option<Self> {
    match token {
      "linux" | "linuxmusl" | "musl" | "debian" | "rhel" | "alpine" | "ubuntu" | "centos" | "fedora"
      | "gnu" => Some(Self::Linux),
      "darwin" | "macos" | "osx" => Some(Self::MacOs),
      "windows" | "win32" | "win64" | "win" | "msvc" | "mingw" => Some(Self::Windows),
      t if t.starts_with("freebsd") => Some(Self::FreeBsd),
      _ => None,
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Os {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "linux" => Ok(Self::Linux),
      "darwin" | "macos" | "osx" => Ok(Self::MacOs),
      "windows" | "win32" | "win" => Ok(Self::Windows),
      "freebsd" => Ok(Self::FreeBsd),
      _ => Err(PlatformError::UnknownOs(s.to_string())),
    }
  }
}
