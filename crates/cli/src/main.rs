mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{BundleArgs, PublishArgs};
use crate::output::{OutputFormat, print_error};

/// layerpack - bundle dependency trees into single-platform function layers
#[derive(Parser)]
#[command(name = "layerpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Bundle an installed dependency tree into a pruned artifact directory
  Bundle(BundleArgs),

  /// Publish a bundled artifact as a new layer version
  Publish(PublishArgs),

  /// List published layers, or the versions of one layer
  Layers {
    /// Layer name (lists every layer when omitted)
    name: Option<String>,

    /// Layer store root (default: $LAYERPACK_STORE or the user data directory)
    #[arg(long)]
    store: Option<PathBuf>,
  },

  /// Validate a deployment descriptor
  Check {
    /// Path to the descriptor
    #[arg(default_value = "deploy.toml")]
    descriptor: PathBuf,
  },

  /// Print the outputs of a finished deployment
  Outputs {
    /// JSON outputs file written by the provisioning engine
    file: PathBuf,

    /// Stack to read when the file holds several
    #[arg(long)]
    stack: Option<String>,
  },

  /// Show host platform and store location
  Info,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result = match cli.command {
    Commands::Bundle(args) => cmd::cmd_bundle(args, cli.output),
    Commands::Publish(args) => cmd::cmd_publish(args, cli.output),
    Commands::Layers { name, store } => cmd::cmd_layers(name.as_deref(), store, cli.output),
    Commands::Check { descriptor } => cmd::cmd_check(&descriptor, cli.output),
    Commands::Outputs { file, stack } => cmd::cmd_outputs(&file, stack.as_deref(), cli.output),
    Commands::Info => cmd::cmd_info(cli.output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}

/// `RUST_LOG` wins unless `--verbose` is given. Logs go to stderr so JSON
/// output on stdout stays parseable.
fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("warn,layerpack_lib=debug,layerpack_cli=debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}
