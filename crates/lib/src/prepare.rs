//! The staging coordinator.
//!
//! [`StagingManager`] ties the phases together: scan, parse, classify,
//! resolve, stage, and the exact reversal of staging. It owns the project
//! layout, the installed-package registry, and the staging ledger, and
//! moves through an explicit phase machine so prepare and cleanup cannot
//! silently interleave.
//!
//! Analysis never mutates the tree and can run any number of times.
//! Prepare is idempotent: a second call re-analyzes and finds every target
//! already recorded or already identical. Cleanup drains the ledger and
//! leaves the tree byte-identical to its pre-prepare state.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classify::{Classifier, PackageRegistry};
use crate::parse::extract_imports;
use crate::project::ProjectLayout;
use crate::resolve::Resolver;
use crate::scan::{ScanError, scan_source_files};
use crate::stage::{StageError, StagingLedger, cleanup, matches_source, stage_dependency};
use crate::types::{Classification, ClassifiedImport, ResolvedDependency, Warning};

/// Error that aborts a prepare or cleanup run.
#[derive(Debug, Error)]
pub enum PrepareError {
  #[error(transparent)]
  Scan(#[from] ScanError),

  #[error(transparent)]
  Stage(#[from] StageError),
}

/// Where the manager is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  NotPrepared,
  Prepared,
  CleanedUp,
}

/// Everything one analysis pass produced.
///
/// Warnings are part of the result, not a failure channel: a report with
/// warnings is still complete over everything that could be processed.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
  /// Every classified declaration, in scan order then source order.
  pub imports: Vec<ClassifiedImport>,

  /// External dependencies resolved to disk, deduplicated by target path.
  pub dependencies: Vec<ResolvedDependency>,

  /// Non-fatal conditions encountered along the way.
  pub warnings: Vec<Warning>,
}

impl AnalysisReport {
  /// Count of declarations in a given category.
  pub fn count(&self, classification: Classification) -> usize {
    self.imports.iter().filter(|i| i.classification == classification).count()
  }
}

/// Coordinates analysis and staging for one project.
#[derive(Debug)]
pub struct StagingManager {
  layout: ProjectLayout,
  classifier: Classifier,
  resolver: Resolver,
  ledger: StagingLedger,
  phase: Phase,
}

impl StagingManager {
  pub fn new(layout: ProjectLayout, registry: PackageRegistry) -> Self {
    let classifier = Classifier::new(layout.root(), layout.src_dir(), registry);
    let resolver = Resolver::new(layout.root(), layout.src_dir());
    Self {
      layout,
      classifier,
      resolver,
      ledger: StagingLedger::new(),
      phase: Phase::NotPrepared,
    }
  }

  pub fn layout(&self) -> &ProjectLayout {
    &self.layout
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn ledger(&self) -> &StagingLedger {
    &self.ledger
  }

  /// Read-only analysis pass: scan, extract, classify, resolve.
  ///
  /// Files that fail to read or parse are skipped with a warning; external
  /// declarations with no backing path are reclassified ambiguous. The
  /// tree is never modified.
  pub fn analyze(&self) -> Result<AnalysisReport, PrepareError> {
    let mut report = AnalysisReport::default();

    let files = scan_source_files(self.layout.src_dir(), &mut report.warnings)?;

    for file in &files {
      let source = match fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
          report.warnings.push(Warning::ParseFailure {
            file: file.clone(),
            detail: e.to_string(),
          });
          continue;
        }
      };

      let declarations = match extract_imports(&source, file) {
        Ok(d) => d,
        Err(e) => {
          warn!(file = %file.display(), error = %e, "skipping unparseable file");
          report.warnings.push(Warning::ParseFailure {
            file: file.clone(),
            detail: e.to_string(),
          });
          continue;
        }
      };

      for declaration in declarations {
        let mut classification = self.classifier.classify(&declaration, &mut report.warnings);

        if classification == Classification::External {
          match self.resolver.resolve(&declaration) {
            Some(dep) => self.push_dependency(&mut report, dep),
            None => {
              // Classified external but nothing on disk backs it.
              report.warnings.push(Warning::ResolutionFailure {
                module_path: declaration.module_path.clone(),
                file: declaration.declaring_file.clone(),
                line: declaration.line_number,
              });
              classification = Classification::Ambiguous;
            }
          }
        }

        report.imports.push(ClassifiedImport {
          declaration,
          classification,
        });
      }
    }

    info!(
      files = files.len(),
      imports = report.imports.len(),
      external = report.dependencies.len(),
      warnings = report.warnings.len(),
      "analysis complete"
    );
    Ok(report)
  }

  /// Analyze, then stage every resolved external dependency.
  ///
  /// Safe to call again: already-recorded and already-identical targets
  /// are no-ops. A staging conflict aborts with the ledger intact, so the
  /// dependencies staged before the conflict can still be cleaned up.
  pub fn prepare(&mut self) -> Result<AnalysisReport, PrepareError> {
    let mut report = self.analyze()?;

    for dep in &report.dependencies {
      if !dep.source_path.exists() {
        // Resolved a moment ago but gone now; staging it would fail midway.
        report.warnings.push(Warning::MissingDependency {
          source_path: dep.source_path.clone(),
        });
        continue;
      }
      stage_dependency(dep, &mut self.ledger)?;
    }

    self.phase = Phase::Prepared;
    info!(staged = self.ledger.staged_count(), "prepare complete");
    Ok(report)
  }

  /// Reverse staging: remove every target this manager created.
  ///
  /// Safe in any phase, including before prepare and after a previous
  /// cleanup; both are no-ops on an empty ledger.
  pub fn cleanup(&mut self) -> Result<(), PrepareError> {
    cleanup(&mut self.ledger)?;
    self.phase = Phase::CleanedUp;
    Ok(())
  }

  /// Remove staged leftovers from an earlier process.
  ///
  /// The ledger lives only as long as the process, so a crashed run can
  /// leave copies behind. Those copies classify as local on re-analysis,
  /// so this pass resolves each absolute local import back to an origin
  /// outside the source dir and removes the src copy when its content
  /// still matches that origin byte for byte. Copies edited since staging
  /// no longer match and are left alone. Returns the removed paths.
  pub fn cleanup_residual(&mut self) -> Result<Vec<PathBuf>, PrepareError> {
    let report = self.analyze()?;
    let mut removed = Vec::new();

    for imported in &report.imports {
      if imported.classification != Classification::Local || imported.declaration.relative_level > 0 {
        continue;
      }
      // `locate` rejects matches inside the source dir, so a hit here is
      // the copy's original location.
      let Some(dep) = self.resolver.resolve(&imported.declaration) else {
        continue;
      };
      if self.ledger.is_recorded(&dep.target_path) {
        continue;
      }
      if !dep.target_path.exists() || !matches_source(&dep)? {
        continue;
      }
      self.ledger.record(dep.target_path.clone(), dep.source_path.clone(), false);
      removed.push(dep.target_path.clone());
    }

    cleanup(&mut self.ledger)?;

    // Directories created for dotted staged files are empty once their
    // copies are gone; prune them up to the source dir. `remove_dir`
    // refuses non-empty directories, so user content is never touched.
    for target in &removed {
      let mut cursor = target.parent();
      while let Some(dir) = cursor {
        if dir == self.layout.src_dir() || fs::remove_dir(dir).is_err() {
          break;
        }
        cursor = dir.parent();
      }
    }

    self.phase = Phase::CleanedUp;
    debug!(removed = removed.len(), "residual cleanup complete");
    Ok(removed)
  }

  /// Deduplicate by target path; the first resolution of a target wins.
  fn push_dependency(&self, report: &mut AnalysisReport, dep: ResolvedDependency) {
    if report.dependencies.iter().any(|d| d.target_path == dep.target_path) {
      return;
    }
    report.dependencies.push(dep);
  }
}
