use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use layerpack_lib::descriptor::{DeploymentDescriptor, Finding, Severity, UrlAuth, has_errors};
use layerpack_lib::platform::Platform;

use crate::output::{OutputFormat, print_error, print_json, print_stat, print_success, print_warning};

#[derive(Serialize)]
struct CheckReport<'a> {
  target_platform: Platform,
  url_auth: UrlAuth,
  findings: &'a [Finding],
}

pub fn cmd_check(path: &Path, output: OutputFormat) -> Result<()> {
  let descriptor = DeploymentDescriptor::load(path).context("Failed to load deployment descriptor")?;
  let findings = descriptor.validate();
  let errors = findings.iter().filter(|f| f.severity == Severity::Error).count();

  if output.is_json() {
    print_json(&CheckReport {
      target_platform: descriptor.function.target_platform(),
      url_auth: descriptor.function_url.auth,
      findings: &findings,
    })?;
  } else {
    for finding in &findings {
      let line = format!("{}: {}", finding.field, finding.message);
      match finding.severity {
        Severity::Error => print_error(&line),
        Severity::Warning => print_warning(&line),
      }
    }
    if errors == 0 {
      println!();
      print_success(&format!("{} is valid", path.display()));
      print_stat("Function", &descriptor.function.name);
      print_stat("Layer", &descriptor.layer.name);
      print_stat("Target platform", &descriptor.function.target_platform().to_string());
      print_stat("URL auth", &descriptor.function_url.auth.to_string());
    }
  }

  if has_errors(&findings) {
    bail!("{} has {} error(s)", path.display(), errors);
  }
  Ok(())
}
