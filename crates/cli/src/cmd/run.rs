use std::process::Command;

use anyhow::{Context, Result};

use crate::cmd::{ProjectArgs, build_manager};
use crate::output::{print_error, print_info, print_success, print_warning};

/// Stage, run the wrapped command from the project root, then unstage.
///
/// Cleanup runs whether the command succeeds, fails, or cannot be spawned,
/// so the tree never stays in its staged state past this process.
pub fn cmd_run(args: &ProjectArgs, command: &[String]) -> Result<()> {
  let mut mgr = build_manager(args)?;
  let report = match mgr.prepare() {
    Ok(report) => report,
    Err(e) => {
      // A conflict can abort staging partway; undo what was copied.
      if let Err(cleanup_err) = mgr.cleanup() {
        print_error(&format!("cleanup after failed staging also failed: {}", cleanup_err));
      }
      return Err(e.into());
    }
  };

  for warning in &report.warnings {
    print_warning(&warning.to_string());
  }
  print_info(&format!(
    "staged {} external dependenc(ies), running: {}",
    mgr.ledger().staged_count(),
    command.join(" ")
  ));

  let status = Command::new(&command[0])
    .args(&command[1..])
    .current_dir(mgr.layout().root())
    .status();

  let cleanup_result = mgr.cleanup();

  let status = status.with_context(|| format!("failed to run `{}`", command[0]))?;
  cleanup_result?;

  if !status.success() {
    print_error(&format!("command exited with {}", status));
    std::process::exit(status.code().unwrap_or(1));
  }

  print_success("command succeeded, staging reversed");
  Ok(())
}
