//! Filesystem resolution of external imports.
//!
//! For a declaration classified external, the resolver searches a fixed,
//! ordered set of candidate roots for the backing file or package
//! directory. The order is part of the contract:
//!
//! 1. parent directories of the source dir, walking upward to the project
//!    root;
//! 2. the project root itself, then its direct subdirectories in lexical
//!    order;
//! 3. the literal relative-path reading of the dotted module path from the
//!    project root (which, unlike 1 and 2, accepts a directory without an
//!    initializer file).
//!
//! Within a step a module file match wins over a package directory match,
//! and subdirectories are probed in lexical order, so results never depend
//! on platform enumeration order.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::{INIT_FILE, PY_EXTENSION, is_stage_excluded};
use crate::types::{ImportDeclaration, ResolvedDependency};

/// Resolves external declarations to on-disk dependency paths.
#[derive(Debug, Clone)]
pub struct Resolver {
  project_root: PathBuf,
  src_dir: PathBuf,
}

impl Resolver {
  pub fn new(project_root: &Path, src_dir: &Path) -> Self {
    Self {
      project_root: project_root.to_path_buf(),
      src_dir: src_dir.to_path_buf(),
    }
  }

  /// Resolve a declaration to a stageable dependency.
  ///
  /// Returns `None` when no acceptable backing path exists; the caller
  /// reclassifies the declaration as ambiguous and reports it.
  pub fn resolve(&self, decl: &ImportDeclaration) -> Option<ResolvedDependency> {
    let (source_path, is_directory) = if decl.relative_level > 0 {
      self.locate_relative(decl)?
    } else {
      self.locate(decl)?
    };

    let target_path = self.target_for(decl, &source_path, is_directory)?;

    debug!(
      module = %decl.module_path,
      source = %source_path.display(),
      target = %target_path.display(),
      "resolved external dependency"
    );

    Some(ResolvedDependency {
      import_name: decl.module_path.clone(),
      source_path,
      target_path,
      is_directory,
    })
  }

  /// Search the candidate roots for an absolute dotted module path.
  ///
  /// Returns the backing path and whether it is a package directory.
  pub fn locate(&self, decl: &ImportDeclaration) -> Option<(PathBuf, bool)> {
    let parts = decl.components();
    if parts.is_empty() {
      return None;
    }

    // Step 1: parents of the source dir, walking up to the project root.
    let mut cursor = self.src_dir.parent();
    while let Some(dir) = cursor {
      if !dir.starts_with(&self.project_root) {
        break;
      }
      if let Some(found) = self.probe(dir, &parts) {
        return Some(found);
      }
      if dir == self.project_root {
        break;
      }
      cursor = dir.parent();
    }

    // Step 2: project root, then its direct subdirectories lexically.
    if let Some(found) = self.probe(&self.project_root, &parts) {
      return Some(found);
    }
    for subdir in self.root_subdirs() {
      if let Some(found) = self.probe(&subdir, &parts) {
        return Some(found);
      }
    }

    // Step 3: literal path reading, initializer not required.
    let literal: PathBuf = parts.iter().fold(self.project_root.clone(), |p, c| p.join(c));
    let literal_file = literal.with_extension(PY_EXTENSION);
    if literal_file.is_file() && self.acceptable(&literal_file) {
      return Some((literal_file, false));
    }
    if literal.is_dir() && self.acceptable(&literal) {
      return Some((literal, true));
    }

    None
  }

  /// Resolve a relative import from its declaring file's directory.
  fn locate_relative(&self, decl: &ImportDeclaration) -> Option<(PathBuf, bool)> {
    let base = relative_base(decl)?;
    let parts = decl.components();

    if parts.is_empty() {
      // `from .. import name`: the dependency is the base package itself.
      if base.is_dir() && self.acceptable(&base) {
        return Some((base, true));
      }
      return None;
    }

    self.probe(&base, &parts)
  }

  /// Try `base/<parts>.py`, then `base/<parts>/__init__.py`.
  fn probe(&self, base: &Path, parts: &[&str]) -> Option<(PathBuf, bool)> {
    let stem: PathBuf = parts.iter().fold(base.to_path_buf(), |p, c| p.join(c));

    let module_file = stem.with_extension(PY_EXTENSION);
    if module_file.is_file() && self.acceptable(&module_file) {
      return Some((module_file, false));
    }

    if stem.is_dir() && stem.join(INIT_FILE).is_file() && self.acceptable(&stem) {
      return Some((stem, true));
    }

    None
  }

  /// A candidate is acceptable when it lies outside the source dir, does
  /// not contain the source dir, and is not staging-excluded.
  fn acceptable(&self, path: &Path) -> bool {
    if path.starts_with(&self.src_dir) || self.src_dir.starts_with(path) {
      return false;
    }
    let rel = path.strip_prefix(&self.project_root).unwrap_or(path);
    !is_stage_excluded(rel)
  }

  /// Direct subdirectories of the project root, lexically sorted, with the
  /// source dir excluded.
  fn root_subdirs(&self) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(&self.project_root) else {
      return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
      .flatten()
      .map(|e| e.path())
      .filter(|p| p.is_dir() && *p != self.src_dir)
      .collect();
    dirs.sort();
    dirs
  }

  /// Staging destination derived from the dotted module path, so the staged
  /// layout preserves the import's meaning (`a.b.c` file -> `src/a/b/c.py`,
  /// `a.b` package -> `src/a/b`).
  fn target_for(&self, decl: &ImportDeclaration, source: &Path, is_directory: bool) -> Option<PathBuf> {
    let parts = decl.components();

    if parts.is_empty() {
      // Relative import of a whole package: keep the package's own name.
      let name = source.file_name()?;
      return Some(self.src_dir.join(name));
    }

    if is_directory {
      Some(parts.iter().fold(self.src_dir.clone(), |p, c| p.join(c)))
    } else {
      let mut target = self.src_dir.clone();
      for part in &parts[..parts.len() - 1] {
        target.push(part);
      }
      target.push(source.file_name()?);
      Some(target)
    }
  }
}

/// Base directory a relative import is resolved against: the declaring
/// file's directory, raised one level per dot beyond the first.
fn relative_base(decl: &ImportDeclaration) -> Option<PathBuf> {
  let mut base = decl.declaring_file.parent()?.to_path_buf();
  for _ in 1..decl.relative_level {
    base = base.parent()?.to_path_buf();
  }
  Some(base)
}
