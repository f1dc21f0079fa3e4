//! Core data types for import analysis and staging.
//!
//! Declarations and classifications are ephemeral (recomputed every run);
//! only the staging ledger in [`crate::stage`] carries state across the
//! prepare/cleanup phases of a single process.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// One parsed import statement instance.
///
/// Immutable once extracted. `module_path` is the dotted module name and may
/// be empty for pure relative forms such as `from . import sibling`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDeclaration {
  /// Dotted module name, without leading dots (e.g. `shared.utils`).
  pub module_path: String,

  /// Imported names for `from ... import a, b` forms; empty for
  /// whole-module imports. A star import yields a single `*` entry.
  pub imported_symbols: Vec<String>,

  /// Number of leading dots; 0 for absolute imports.
  pub relative_level: u32,

  /// File the statement was extracted from.
  pub declaring_file: PathBuf,

  /// 1-based line the statement starts on.
  pub line_number: usize,
}

impl ImportDeclaration {
  /// Top-level component of the module path, if any.
  pub fn top_level(&self) -> Option<&str> {
    self.module_path.split('.').next().filter(|s| !s.is_empty())
  }

  /// Dotted-path components, empty for pure relative imports.
  pub fn components(&self) -> Vec<&str> {
    if self.module_path.is_empty() {
      Vec::new()
    } else {
      self.module_path.split('.').collect()
    }
  }
}

/// Origin category assigned to a declaration.
///
/// Exactly one per declaration, assigned once and never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
  /// Standard-library module.
  Stdlib,
  /// Installed third-party package.
  ThirdParty,
  /// Module inside the source directory.
  Local,
  /// Module inside the project but outside the source directory.
  External,
  /// Could not be attributed to any origin.
  Ambiguous,
}

impl fmt::Display for Classification {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Classification::Stdlib => "stdlib",
      Classification::ThirdParty => "third_party",
      Classification::Local => "local",
      Classification::External => "external",
      Classification::Ambiguous => "ambiguous",
    };
    write!(f, "{}", s)
  }
}

/// A declaration together with its assigned classification.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedImport {
  pub declaration: ImportDeclaration,
  pub classification: Classification,
}

/// An external dependency resolved to its on-disk location.
///
/// Produced only for declarations classified `External` that resolved
/// successfully. `target_path` is where the dependency will be staged
/// inside the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDependency {
  /// Module name as written in the import statement.
  pub import_name: String,

  /// Absolute source location, outside the source directory.
  pub source_path: PathBuf,

  /// Absolute staging destination, inside the source directory.
  pub target_path: PathBuf,

  /// Whole package directory vs a single module file.
  pub is_directory: bool,
}

/// Non-fatal condition surfaced alongside a successful result.
///
/// Warnings are collected, never thrown: classification and resolution
/// always produce a best-effort complete result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
  /// A file could not be parsed and was skipped entirely.
  ParseFailure { file: PathBuf, detail: String },

  /// An external declaration had no backing path and was reclassified
  /// ambiguous.
  ResolutionFailure {
    module_path: String,
    file: PathBuf,
    line: usize,
  },

  /// A declaration could not be attributed to any origin.
  AmbiguousImport {
    module_path: String,
    file: PathBuf,
    line: usize,
  },

  /// A name matched both an installed package and a project file; the
  /// installed package won.
  ShadowedPackage { module_path: String, project_path: PathBuf },

  /// A directory symlink was not followed during scanning.
  SymlinkSkipped { path: PathBuf },

  /// A resolved dependency vanished between resolution and staging.
  MissingDependency { source_path: PathBuf },
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Warning::ParseFailure { file, detail } => {
        write!(f, "could not parse {}: {}", file.display(), detail)
      }
      Warning::ResolutionFailure { module_path, file, line } => {
        write!(
          f,
          "could not resolve external import `{}` (line {} in {})",
          module_path,
          line,
          file.display()
        )
      }
      Warning::AmbiguousImport { module_path, file, line } => {
        write!(f, "ambiguous import `{}` (line {} in {})", module_path, line, file.display())
      }
      Warning::ShadowedPackage { module_path, project_path } => {
        write!(
          f,
          "`{}` matches both an installed package and {}; using the installed package",
          module_path,
          project_path.display()
        )
      }
      Warning::SymlinkSkipped { path } => {
        write!(f, "not following directory symlink {}", path.display())
      }
      Warning::MissingDependency { source_path } => {
        write!(f, "external dependency not found: {}", source_path.display())
      }
    }
  }
}
