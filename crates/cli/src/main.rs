use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::ProjectArgs;
use output::OutputFormat;

/// pystage - Import analysis and external-dependency staging for Python
/// source trees
#[derive(Parser)]
#[command(name = "pystage")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Project root (default: discovered from the working directory)
  #[arg(long, global = true)]
  project_root: Option<PathBuf>,

  /// Source directory to analyze (default: discovered under the root)
  #[arg(long, global = true)]
  src_dir: Option<PathBuf>,

  /// Extra site-packages directories to treat as installed packages
  #[arg(long = "site-packages", global = true)]
  site_packages: Vec<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Report import classifications without touching the tree
  Analyze {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
  },

  /// Stage external dependencies into the source tree
  Prepare {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
  },

  /// Remove staged copies left behind by an earlier run
  Cleanup,

  /// Stage, run a command, then always unstage
  Run {
    /// Command and arguments to run after staging
    #[arg(trailing_var_arg = true, required = true)]
    command: Vec<String>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .init();

  let cli = Cli::parse();

  let args = ProjectArgs {
    project_root: cli.project_root,
    src_dir: cli.src_dir,
    site_packages: cli.site_packages,
  };

  match cli.command {
    Commands::Analyze { format } => cmd::cmd_analyze(&args, format),
    Commands::Prepare { format } => cmd::cmd_prepare(&args, format),
    Commands::Cleanup => cmd::cmd_cleanup(&args),
    Commands::Run { command } => cmd::cmd_run(&args, &command),
  }
}
