mod analyze;
mod cleanup;
mod prepare;
mod run;

pub use analyze::cmd_analyze;
pub use cleanup::cmd_cleanup;
pub use prepare::cmd_prepare;
pub use run::cmd_run;

use std::path::PathBuf;

use anyhow::{Context, Result};

use pystage_lib::classify::PackageRegistry;
use pystage_lib::prepare::StagingManager;
use pystage_lib::project::ProjectLayout;

/// Project location flags shared by every subcommand.
pub struct ProjectArgs {
  pub project_root: Option<PathBuf>,
  pub src_dir: Option<PathBuf>,
  pub site_packages: Vec<PathBuf>,
}

/// Resolve the project layout from the flags and build a manager over it.
pub(crate) fn build_manager(args: &ProjectArgs) -> Result<StagingManager> {
  let layout = match (&args.project_root, &args.src_dir) {
    (Some(root), Some(src)) => ProjectLayout::new(root, src).context("invalid project paths")?,
    (Some(root), None) => ProjectLayout::discover(root).context("could not locate project")?,
    (None, Some(src)) => {
      let cwd = std::env::current_dir().context("failed to read working directory")?;
      let discovered = ProjectLayout::discover(&cwd).context("could not locate project")?;
      ProjectLayout::new(discovered.root(), src).context("invalid source directory")?
    }
    (None, None) => {
      let cwd = std::env::current_dir().context("failed to read working directory")?;
      ProjectLayout::discover(&cwd).context("could not locate project")?
    }
  };

  let registry = PackageRegistry::discover(layout.root(), &args.site_packages);
  Ok(StagingManager::new(layout, registry))
}
