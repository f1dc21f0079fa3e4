use anyhow::Result;

use crate::cmd::{ProjectArgs, build_manager};
use crate::output::{print_info, print_success};

pub fn cmd_cleanup(args: &ProjectArgs) -> Result<()> {
  let mut mgr = build_manager(args)?;
  let removed = mgr.cleanup_residual()?;

  if removed.is_empty() {
    print_info("nothing staged to remove");
    return Ok(());
  }

  for path in &removed {
    println!("  removed {}", path.display());
  }
  print_success(&format!("removed {} staged cop(ies)", removed.len()));

  Ok(())
}
