use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformError;

/// CPU architecture variants a native binary can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arch {
  #[serde(rename = "x64")]
  X86_64,
  #[serde(rename = "arm64")]
  Aarch64,
  #[serde(rename = "ia32")]
  X86,
  #[serde(rename = "arm")]
  Arm,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::X86_64),
      "aarch64" => Some(Self::Aarch64),
      "x86" => Some(Self::X86),
      "arm" => Some(Self::Arm),
      _ => None,
    }
  }

  /// Returns the lowercase identifier, following the naming used by
  /// node package platform suffixes (`x64`, `arm64`)
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86_64 => "x64",
      Self::Aarch64 => "arm64",
      Self::X86 => "ia32",
      Self::Arm => "arm",
    }
  }

  /// Classify a single name segment as an architecture token.
  pub fn from_token(token: &str) -> Option<Self> {
    match token {
      "x64" | "amd64" | "x86_64" => Some(Self::X86_64),
      "arm64" | "aarch64" => Some(Self::Aarch64),
      "ia32" | "x86" | "i386" | "i686" => Some(Self::X86),
      "arm" | "armv7" | "armv7l" | "armhf" => Some(Self::Arm),
      _ => None,
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = PlatformError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::from_token(&s.to_ascii_lowercase()).ok_or_else(|| PlatformError::UnknownArch(s.to_string()))
  }
}
