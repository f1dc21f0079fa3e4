use anyhow::Result;
use serde::Serialize;

use pystage_lib::types::ResolvedDependency;

use crate::cmd::{ProjectArgs, build_manager};
use crate::output::{OutputFormat, print_json, print_success, print_warning, symbols};

#[derive(Serialize)]
struct JsonPrepareReport<'a> {
  staged: &'a [ResolvedDependency],
  warnings: Vec<String>,
}

pub fn cmd_prepare(args: &ProjectArgs, format: OutputFormat) -> Result<()> {
  let mut mgr = build_manager(args)?;
  let report = mgr.prepare()?;

  if format.is_json() {
    print_json(&JsonPrepareReport {
      staged: &report.dependencies,
      warnings: report.warnings.iter().map(|w| w.to_string()).collect(),
    })?;
    return Ok(());
  }

  for warning in &report.warnings {
    print_warning(&warning.to_string());
  }

  for (target, entry) in mgr.ledger().entries() {
    println!("  {} {} {}", entry.source_path.display(), symbols::ARROW, target.display());
  }
  print_success(&format!(
    "staged {} external dependenc(ies), {} already present",
    mgr.ledger().staged_count(),
    mgr.ledger().len() - mgr.ledger().staged_count()
  ));

  Ok(())
}
