//! Descriptor validation.
//!
//! Limits follow the function runtime's documented bounds.

use std::ops::RangeInclusive;

use tracing::warn;

use super::types::{DeploymentDescriptor, Finding, Severity, UrlAuth};

const MEMORY_MB: RangeInclusive<u32> = 128..=10_240;
const TIMEOUT_SECS: RangeInclusive<u32> = 1..=900;
const REQUIRED_ENV: &[&str] = &["REGION"];

impl DeploymentDescriptor {
  /// Check the descriptor. Errors make it unusable, warnings flag choices
  /// worth a second look.
  pub fn validate(&self) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (field, value) in [
      ("network.name", &self.network.name),
      ("security_group.name", &self.security_group.name),
      ("database.engine", &self.database.engine),
      ("database.engine_version", &self.database.engine_version),
      ("database.default_database", &self.database.default_database),
      ("database.instance_class", &self.database.instance_class),
      ("database.instance_size", &self.database.instance_size),
      ("layer.name", &self.layer.name),
      ("function.name", &self.function.name),
      ("function.runtime", &self.function.runtime),
    ] {
      if value.trim().is_empty() {
        findings.push(Finding::error(field, "must not be empty"));
      }
    }

    if self.database.instances == 0 {
      findings.push(Finding::error("database.instances", "at least one instance is required"));
    }
    if !self.database.storage_encrypted {
      findings.push(Finding::warning("database.storage_encrypted", "database storage is not encrypted"));
    }

    let function = &self.function;
    if !MEMORY_MB.contains(&function.memory_mb) {
      findings.push(Finding::error(
        "function.memory_mb",
        format!(
          "{} MB is outside {}..={} MB",
          function.memory_mb,
          MEMORY_MB.start(),
          MEMORY_MB.end()
        ),
      ));
    }
    if !TIMEOUT_SECS.contains(&function.timeout_secs) {
      findings.push(Finding::error(
        "function.timeout_secs",
        format!(
          "{} s is outside {}..={} s",
          function.timeout_secs,
          TIMEOUT_SECS.start(),
          TIMEOUT_SECS.end()
        ),
      ));
    }
    match function.handler.rsplit_once('.') {
      Some((file, export)) if !file.is_empty() && !export.is_empty() => {}
      _ => findings.push(Finding::error(
        "function.handler",
        format!("'{}' is not of the form <file>.<export>", function.handler),
      )),
    }
    for key in REQUIRED_ENV {
      if !function.environment.contains_key(*key) {
        findings.push(Finding::error(
          "function.environment",
          format!("{} must be set", key),
        ));
      }
    }

    if !self.layer.compatible_runtimes.is_empty() && !self.layer.compatible_runtimes.contains(&function.runtime) {
      findings.push(Finding::error(
        "layer.compatible_runtimes",
        format!("layer does not list the function runtime '{}'", function.runtime),
      ));
    }

    if self.function_url.auth == UrlAuth::None {
      warn!(function = %function.name, "function URL is open to unauthenticated callers");
      findings.push(Finding::warning(
        "function_url.auth",
        "function URL accepts unauthenticated requests from anyone",
      ));
    }

    findings.push(Finding::warning(
      "security_group",
      format!(
        "database and function share security group '{}' but no ingress rule is declared; reachability is not verified",
        self.security_group.name
      ),
    ));

    findings.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.field.cmp(&b.field)));
    findings
  }
}

/// Whether any finding is an error.
pub fn has_errors(findings: &[Finding]) -> bool {
  findings.iter().any(|f| f.severity == Severity::Error)
}
