//! Project layout discovery.
//!
//! Locates the project root (nearest ancestor carrying `pyproject.toml`)
//! and the source directory the analysis operates on. Both paths are
//! canonicalized once at discovery so every later comparison is a plain
//! prefix check.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::{PROJECT_MANIFEST, PY_EXTENSION, SRC_DIR_NAME};

/// Error while locating the project.
#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("no {PROJECT_MANIFEST} found in {0} or any parent directory")]
  RootNotFound(PathBuf),

  #[error("source directory not found under {0}")]
  SourceDirNotFound(PathBuf),

  #[error("{0} is not a directory")]
  NotADirectory(PathBuf),

  #[error("failed to canonicalize {path}: {source}")]
  Canonicalize {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Resolved project root and source directory.
///
/// The source dir is always inside the root; `discover` and `new` both
/// enforce this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
  root: PathBuf,
  src_dir: PathBuf,
}

impl ProjectLayout {
  /// Discover the layout starting from `start` (typically the cwd).
  ///
  /// The root is the nearest ancestor with a `pyproject.toml`; the source
  /// dir is `start` itself when it already holds Python files, then
  /// `<root>/src`, then the root.
  pub fn discover(start: &Path) -> Result<Self, ProjectError> {
    let start = canonicalize(start)?;
    let root = find_project_root(&start)?;
    let src_dir = find_source_dir(&root, &start)?;
    debug!(root = %root.display(), src = %src_dir.display(), "discovered project layout");
    Ok(Self { root, src_dir })
  }

  /// Build a layout from explicit paths, validating both.
  pub fn new(root: &Path, src_dir: &Path) -> Result<Self, ProjectError> {
    let root = canonicalize(root)?;
    let src_dir = canonicalize(src_dir)?;
    if !root.is_dir() {
      return Err(ProjectError::NotADirectory(root));
    }
    if !src_dir.is_dir() {
      return Err(ProjectError::NotADirectory(src_dir));
    }
    if !src_dir.starts_with(&root) {
      return Err(ProjectError::SourceDirNotFound(root));
    }
    Ok(Self { root, src_dir })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn src_dir(&self) -> &Path {
    &self.src_dir
  }
}

fn canonicalize(path: &Path) -> Result<PathBuf, ProjectError> {
  dunce::canonicalize(path).map_err(|e| ProjectError::Canonicalize {
    path: path.to_path_buf(),
    source: e,
  })
}

/// Walk up from `start` to the nearest directory holding the manifest.
fn find_project_root(start: &Path) -> Result<PathBuf, ProjectError> {
  let mut cursor = if start.is_dir() { Some(start) } else { start.parent() };
  while let Some(dir) = cursor {
    if dir.join(PROJECT_MANIFEST).is_file() {
      return Ok(dir.to_path_buf());
    }
    cursor = dir.parent();
  }
  Err(ProjectError::RootNotFound(start.to_path_buf()))
}

/// Pick the source directory for analysis.
///
/// Preference order: `start` itself when it directly contains Python
/// files and lies inside the root, then `<root>/src`, then the root
/// itself when analysis started there and it directly holds Python files.
fn find_source_dir(root: &Path, start: &Path) -> Result<PathBuf, ProjectError> {
  if start.is_dir() && start.starts_with(root) && start != root && contains_python(start) {
    return Ok(start.to_path_buf());
  }

  let src = root.join(SRC_DIR_NAME);
  if src.is_dir() {
    return Ok(src);
  }

  if start == root && contains_python(root) {
    return Ok(root.to_path_buf());
  }

  Err(ProjectError::SourceDirNotFound(root.to_path_buf()))
}

/// Whether `dir` directly contains any `.py` file. Nested sources do not
/// count; a directory of subpackages is not itself a source dir.
fn contains_python(dir: &Path) -> bool {
  fs::read_dir(dir)
    .map(|entries| {
      entries
        .flatten()
        .any(|e| e.path().is_file() && e.path().extension().and_then(|x| x.to_str()) == Some(PY_EXTENSION))
    })
    .unwrap_or(false)
}
