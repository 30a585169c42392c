use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use layerpack_lib::layer::{LayerStore, PublishOptions};

use crate::output::{OutputFormat, format_bytes, print_json, print_stat, print_success};

#[derive(Debug, Args)]
pub struct PublishArgs {
  /// Artifact directory produced by `layerpack bundle`
  pub artifact: PathBuf,

  /// Layer name
  #[arg(long)]
  pub name: String,

  /// Layer description
  #[arg(long)]
  pub description: Option<String>,

  /// Compatible runtime (repeatable), e.g. nodejs16.x
  #[arg(long = "runtime")]
  pub runtimes: Vec<String>,

  /// Directory inside the archive holding the artifact, e.g. nodejs
  #[arg(long)]
  pub prefix: Option<String>,

  /// Layer store root (default: $LAYERPACK_STORE or the user data directory)
  #[arg(long)]
  pub store: Option<PathBuf>,
}

pub fn cmd_publish(args: PublishArgs, output: OutputFormat) -> Result<()> {
  let store = args.store.map(LayerStore::new).unwrap_or_else(LayerStore::default_store);

  let options = PublishOptions {
    name: args.name,
    description: args.description,
    compatible_runtimes: args.runtimes,
    prefix: args.prefix,
  };

  let layer = store
    .publish(&args.artifact, &options)
    .with_context(|| format!("Failed to publish {}", args.artifact.display()))?;

  if output.is_json() {
    return print_json(&layer);
  }

  println!();
  print_success(&format!("Published {}", layer.identifier));
  print_stat("Platform", &layer.platform.to_string());
  print_stat("Content hash", layer.content_hash.short());
  print_stat("Size", &format_bytes(layer.size_bytes));
  print_stat("Archive", &format_bytes(layer.archive_bytes));
  print_stat(
    "Location",
    &store.archive_path(&layer.name, layer.version).display().to_string(),
  );

  Ok(())
}
