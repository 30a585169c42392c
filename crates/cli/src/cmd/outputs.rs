use std::path::Path;

use anyhow::{Context, Result};

use layerpack_lib::descriptor::DeploymentOutputs;

use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_outputs(file: &Path, stack: Option<&str>, output: OutputFormat) -> Result<()> {
  let outputs = DeploymentOutputs::load(file, stack)
    .with_context(|| format!("Failed to read deployment outputs from {}", file.display()))?;

  if output.is_json() {
    return print_json(&outputs);
  }

  print_stat("Network", &outputs.network_id);
  print_stat("Security group", &outputs.security_group_id);
  print_stat("Database host", &outputs.database_hostname);
  print_stat("Layer version", &outputs.layer_version_id);
  print_stat("Function", &outputs.function_id);
  print_stat("URL", &outputs.function_url);

  Ok(())
}
