use anyhow::Result;
use serde::Serialize;

use pystage_lib::prepare::AnalysisReport;
use pystage_lib::types::{Classification, ClassifiedImport, ResolvedDependency};

use crate::cmd::{ProjectArgs, build_manager};
use crate::output::{OutputFormat, print_info, print_json, print_stat, print_warning, symbols};

#[derive(Serialize)]
struct JsonReport<'a> {
  imports: &'a [ClassifiedImport],
  dependencies: &'a [ResolvedDependency],
  warnings: Vec<String>,
}

pub fn cmd_analyze(args: &ProjectArgs, format: OutputFormat) -> Result<()> {
  let mgr = build_manager(args)?;
  let report = mgr.analyze()?;

  if format.is_json() {
    print_json(&JsonReport {
      imports: &report.imports,
      dependencies: &report.dependencies,
      warnings: report.warnings.iter().map(|w| w.to_string()).collect(),
    })?;
    return Ok(());
  }

  for warning in &report.warnings {
    print_warning(&warning.to_string());
  }

  print_info(&format!(
    "{} import(s) in {}",
    report.imports.len(),
    mgr.layout().src_dir().display()
  ));
  print_classification_stats(&report);

  if !report.dependencies.is_empty() {
    println!();
    print_info("external dependencies:");
    for dep in &report.dependencies {
      println!(
        "  {} {} {}",
        dep.import_name,
        symbols::ARROW,
        dep.source_path.display()
      );
    }
  }

  Ok(())
}

fn print_classification_stats(report: &AnalysisReport) {
  for classification in [
    Classification::Stdlib,
    Classification::ThirdParty,
    Classification::Local,
    Classification::External,
    Classification::Ambiguous,
  ] {
    print_stat(&classification.to_string(), &report.count(classification).to_string());
  }
}
