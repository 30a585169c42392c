//! Implementation of the `layerpack bundle` command.
//!
//! Resolves the source directory, configuration and target platform, then
//! runs the bundler on a current-thread runtime.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::{debug, info};

use layerpack_lib::bundle::{BundleOptions, bundle};
use layerpack_lib::config::ConfigFile;
use layerpack_lib::descriptor::DeploymentDescriptor;
use layerpack_lib::platform::{Arch, Os, Platform};

use crate::output::{
  OutputFormat, format_bytes, format_duration, print_json, print_stat, print_success, print_warning,
};

#[derive(Debug, Args)]
pub struct BundleArgs {
  /// Source directory holding the manifest, lockfile and node_modules
  /// (default: the descriptor's layer source)
  pub source: Option<PathBuf>,

  /// Output artifact directory
  #[arg(long)]
  pub out: PathBuf,

  /// Target platform, e.g. linux-x64 or linux-arm64
  #[arg(long)]
  pub target: Option<Platform>,

  /// Deployment descriptor supplying the layer source and function architecture
  #[arg(long)]
  pub descriptor: Option<PathBuf>,

  /// Configuration file (default: <source>/layerpack.toml)
  #[arg(long)]
  pub config: Option<PathBuf>,

  /// Skip client generation
  #[arg(long)]
  pub skip_generate: bool,

  /// Shell used to run the generate command
  #[arg(long)]
  pub shell: Option<String>,
}

/// Platform used when neither the command line, the descriptor nor the
/// config names one: the function runtime's default architecture.
fn default_target() -> Platform {
  Platform::new(Os::Linux, Arch::X86_64)
}

pub fn cmd_bundle(args: BundleArgs, output: OutputFormat) -> Result<()> {
  let descriptor = args
    .descriptor
    .as_deref()
    .map(|path| DeploymentDescriptor::load(path).map(|d| (path, d)))
    .transpose()
    .context("Failed to load deployment descriptor")?;

  let source = match (&args.source, &descriptor) {
    (Some(source), _) => source.clone(),
    (None, Some((path, descriptor))) => descriptor_dir(path).join(&descriptor.layer.source),
    (None, None) => bail!("no source directory: pass <SOURCE> or --descriptor"),
  };

  let config = match &args.config {
    Some(path) => ConfigFile::load(path),
    None => ConfigFile::discover(&source),
  }
  .context("Failed to load configuration")?
  .bundle;

  let target = args
    .target
    .or_else(|| descriptor.as_ref().map(|(_, d)| d.function.target_platform()))
    .or(config.target)
    .unwrap_or_else(default_target);
  info!(target = %target, source = %source.display(), "resolved bundle inputs");

  let mut options = BundleOptions::new(config, &args.out);
  options.skip_generate = args.skip_generate;
  options.shell = args.shell;

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;
  let artifact = rt
    .block_on(bundle(&source, target, &options))
    .with_context(|| format!("Bundling {} failed", source.display()))?;

  if output.is_json() {
    return print_json(&artifact);
  }

  let report = &artifact.report;
  for name in &report.unlocked_dependencies {
    print_warning(&format!("{} is not in the lockfile", name));
  }

  let shown = dunce::canonicalize(&artifact.path).unwrap_or_else(|_| artifact.path.clone());
  debug!(path = %shown.display(), "artifact written");
  println!();
  print_success(&format!("Bundled {} for {}", shown.display(), artifact.platform));
  print_stat("Content hash", artifact.content_hash.short());
  print_stat("Size", &format_bytes(artifact.size_bytes));
  print_stat("Files copied", &report.files_copied.to_string());
  print_stat("Paths removed", &report.removed_paths.len().to_string());
  print_stat("Packages removed", &report.packages_removed.len().to_string());
  print_stat(
    "Binaries",
    &format!("{} kept, {} removed", report.binaries_kept(), report.binaries_removed()),
  );
  print_stat("Client generated", if report.generated { "yes" } else { "no" });
  print_stat("Duration", &format_duration(Duration::from_millis(report.duration_ms)));

  Ok(())
}

fn descriptor_dir(path: &Path) -> PathBuf {
  path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .map(Path::to_path_buf)
    .unwrap_or_else(|| PathBuf::from("."))
}
