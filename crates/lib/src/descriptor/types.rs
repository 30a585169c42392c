use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::{Arch, Os, Platform};

#[derive(Debug, Error)]
pub enum DescriptorError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid deployment descriptor {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("invalid outputs file {path}: {source}")]
  ParseOutputs {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("stack '{0}' not found in outputs file")]
  UnknownStack(String),

  #[error("outputs file holds several stacks ({0}); pick one with --stack")]
  AmbiguousStack(String),

  #[error("output '{0}' missing from outputs file")]
  MissingOutput(&'static str),
}

/// Deployment inputs for the network, database, layer, function and its
/// public endpoint. Configuration only; provisioning happens elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentDescriptor {
  pub network: NetworkSpec,
  pub security_group: SecurityGroupSpec,
  pub database: DatabaseSpec,
  pub layer: LayerSpec,
  pub function: FunctionSpec,
  pub function_url: FunctionUrlSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSpec {
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityGroupSpec {
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSpec {
  pub engine: String,
  pub engine_version: String,
  pub default_database: String,
  pub instance_class: String,
  pub instance_size: String,
  #[serde(default = "default_instances")]
  pub instances: u32,
  #[serde(default = "default_true")]
  pub storage_encrypted: bool,
}

fn default_instances() -> u32 {
  1
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerSpec {
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  /// Source directory handed to the bundler, relative to the descriptor.
  pub source: PathBuf,
  #[serde(default)]
  pub compatible_runtimes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionArch {
  #[default]
  #[serde(rename = "x86_64")]
  X86_64,
  #[serde(rename = "arm64")]
  Arm64,
}

impl FunctionArch {
  pub fn arch(&self) -> Arch {
    match self {
      Self::X86_64 => Arch::X86_64,
      Self::Arm64 => Arch::Aarch64,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionSpec {
  pub name: String,
  pub runtime: String,
  /// `<file>.<export>`, e.g. `main.handler`.
  pub handler: String,
  #[serde(default)]
  pub source: Option<PathBuf>,
  #[serde(default)]
  pub architecture: FunctionArch,
  pub memory_mb: u32,
  pub timeout_secs: u32,
  #[serde(default)]
  pub environment: BTreeMap<String, String>,
}

impl FunctionSpec {
  /// Platform the layer must be bundled for: functions always run on Linux.
  pub fn target_platform(&self) -> Platform {
    Platform::new(Os::Linux, self.architecture.arch())
  }
}

/// Authentication for the function's public URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlAuth {
  /// Anyone with the URL may invoke the function.
  None,
  /// Callers must sign requests with cloud credentials.
  Iam,
}

impl fmt::Display for UrlAuth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      UrlAuth::None => write!(f, "none"),
      UrlAuth::Iam => write!(f, "iam"),
    }
  }
}

/// `auth` has no default and must be written out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionUrlSpec {
  pub auth: UrlAuth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Warning,
  Error,
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Severity::Warning => write!(f, "warning"),
      Severity::Error => write!(f, "error"),
    }
  }
}

/// One validation result for a descriptor field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
  pub severity: Severity,
  /// Dotted path of the field, e.g. `function.memory_mb`.
  pub field: String,
  pub message: String,
}

impl Finding {
  pub fn error(field: &str, message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Error,
      field: field.to_string(),
      message: message.into(),
    }
  }

  pub fn warning(field: &str, message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Warning,
      field: field.to_string(),
      message: message.into(),
    }
  }
}

/// Identifiers published once the deployment exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentOutputs {
  pub network_id: String,
  pub security_group_id: String,
  pub database_hostname: String,
  pub layer_version_id: String,
  pub function_id: String,
  pub function_url: String,
}
