use std::path::PathBuf;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use layerpack_lib::layer::{LayerStore, LayerVersion};

use crate::output::{OutputFormat, format_bytes, format_timestamp, print_info, print_json, symbols};

#[derive(Serialize)]
struct LayerSummary {
  name: String,
  latest: LayerVersion,
  versions: usize,
}

pub fn cmd_layers(name: Option<&str>, store: Option<PathBuf>, output: OutputFormat) -> Result<()> {
  let store = store.map(LayerStore::new).unwrap_or_else(LayerStore::default_store);

  match name {
    Some(name) => list_versions(&store, name, output),
    None => list_layers(&store, output),
  }
}

fn list_versions(store: &LayerStore, name: &str, output: OutputFormat) -> Result<()> {
  let versions = store
    .list(name)
    .with_context(|| format!("Failed to list versions of '{}'", name))?;

  if output.is_json() {
    return print_json(&versions);
  }

  if versions.is_empty() {
    print_info(&format!("No versions of '{}' published", name));
    return Ok(());
  }

  for layer in &versions {
    println!(
      "{} {}  {}  {}  {}",
      symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      layer.identifier,
      layer.platform,
      format_bytes(layer.archive_bytes),
      format_timestamp(layer.created_at).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }

  Ok(())
}

fn list_layers(store: &LayerStore, output: OutputFormat) -> Result<()> {
  let mut summaries = Vec::new();
  for name in store.names().context("Failed to read layer store")? {
    let versions = store.list(&name)?;
    if let Some(latest) = versions.last().cloned() {
      summaries.push(LayerSummary {
        name,
        latest,
        versions: versions.len(),
      });
    }
  }

  if output.is_json() {
    return print_json(&summaries);
  }

  if summaries.is_empty() {
    print_info(&format!("No layers in {}", store.base_path().display()));
    return Ok(());
  }

  for summary in &summaries {
    println!(
      "{} {}  {} version(s), latest {}",
      symbols::ARROW.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      summary.name,
      summary.versions,
      summary.latest.identifier
    );
  }

  Ok(())
}
