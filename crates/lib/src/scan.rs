//! Deterministic enumeration of Python source files.
//!
//! The scanner walks a directory tree in lexical path order so repeated
//! runs always see the same file sequence regardless of platform
//! enumeration order. Symlinks are never followed, which also rules out
//! symlink loops; a skipped directory symlink is surfaced as a warning.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::consts::{EGG_INFO_SUFFIX, PY_EXTENSION, SCAN_EXCLUDES};
use crate::types::Warning;

/// Error during source scanning.
#[derive(Debug, Error)]
pub enum ScanError {
  #[error("source directory not found: {0}")]
  RootNotFound(PathBuf),

  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },
}

/// Returns true for directory names that never contain project sources.
fn is_excluded_dir(name: &str) -> bool {
  SCAN_EXCLUDES.contains(&name) || name.ends_with(EGG_INFO_SUFFIX)
}

/// Recursively enumerate `.py` files under `root` in lexical path order.
///
/// Excluded directories (virtualenvs, caches, build output) are pruned.
/// Directory symlinks are skipped with a warning appended to `warnings`
/// rather than followed.
pub fn scan_source_files(root: &Path, warnings: &mut Vec<Warning>) -> Result<Vec<PathBuf>, ScanError> {
  if !root.is_dir() {
    return Err(ScanError::RootNotFound(root.to_path_buf()));
  }

  let mut files = Vec::new();

  let walker = WalkDir::new(root)
    .follow_links(false)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| {
      if !e.file_type().is_dir() && !e.path_is_symlink() {
        return true;
      }
      e.file_name().to_str().map(|name| !is_excluded_dir(name)).unwrap_or(true)
    });

  for entry in walker {
    let entry = entry.map_err(|e| {
      let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
      ScanError::Walk { path, source: e }
    })?;

    if entry.path_is_symlink() {
      // Following could loop back into an ancestor; skip instead.
      if entry.file_type().is_dir() || fs_target_is_dir(entry.path()) {
        warn!(path = %entry.path().display(), "skipping directory symlink");
        warnings.push(Warning::SymlinkSkipped {
          path: entry.path().to_path_buf(),
        });
      }
      continue;
    }

    if entry.file_type().is_file()
      && entry.path().extension().and_then(|e| e.to_str()) == Some(PY_EXTENSION)
    {
      files.push(entry.path().to_path_buf());
    }
  }

  debug!(root = %root.display(), count = files.len(), "scanned source files");
  Ok(files)
}

/// With `follow_links(false)` a symlink entry reports the link's own file
/// type; peek at the target to tell directory links from file links.
fn fs_target_is_dir(path: &Path) -> bool {
  std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  fn scan(root: &Path) -> (Vec<PathBuf>, Vec<Warning>) {
    let mut warnings = Vec::new();
    let files = scan_source_files(root, &mut warnings).unwrap();
    (files, warnings)
  }

  #[test]
  fn finds_files_in_lexical_order() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("b")).unwrap();
    fs::write(temp.path().join("b/late.py"), "").unwrap();
    fs::write(temp.path().join("a_first.py"), "").unwrap();
    fs::write(temp.path().join("z_last.py"), "").unwrap();
    fs::write(temp.path().join("notes.txt"), "").unwrap();

    let (files, warnings) = scan(temp.path());
    let names: Vec<_> = files
      .iter()
      .map(|p| p.strip_prefix(temp.path()).unwrap().to_string_lossy().replace('\\', "/"))
      .collect();

    assert_eq!(names, vec!["a_first.py", "b/late.py", "z_last.py"]);
    assert!(warnings.is_empty());
  }

  #[test]
  fn rerun_is_reproducible() {
    let temp = tempdir().unwrap();
    for name in ["m.py", "a.py", "k.py"] {
      fs::write(temp.path().join(name), "").unwrap();
    }

    let (first, _) = scan(temp.path());
    let (second, _) = scan(temp.path());
    assert_eq!(first, second);
  }

  #[test]
  fn prunes_excluded_directories() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("__pycache__")).unwrap();
    fs::write(temp.path().join("__pycache__/cached.py"), "").unwrap();
    fs::create_dir(temp.path().join(".venv")).unwrap();
    fs::write(temp.path().join(".venv/site.py"), "").unwrap();
    fs::create_dir(temp.path().join("pkg.egg-info")).unwrap();
    fs::write(temp.path().join("pkg.egg-info/top.py"), "").unwrap();
    fs::write(temp.path().join("kept.py"), "").unwrap();

    let (files, _) = scan(temp.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("kept.py"));
  }

  #[test]
  fn missing_root_is_an_error() {
    let temp = tempdir().unwrap();
    let mut warnings = Vec::new();
    let result = scan_source_files(&temp.path().join("absent"), &mut warnings);
    assert!(matches!(result, Err(ScanError::RootNotFound(_))));
  }

  #[cfg(unix)]
  #[test]
  fn directory_symlink_is_skipped_with_warning() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("real")).unwrap();
    fs::write(temp.path().join("real/mod.py"), "").unwrap();
    // Link back to the scan root: following it would loop forever.
    std::os::unix::fs::symlink(temp.path(), temp.path().join("real/loop")).unwrap();

    let (files, warnings) = scan(temp.path());
    assert_eq!(files.len(), 1);
    assert!(
      warnings
        .iter()
        .any(|w| matches!(w, Warning::SymlinkSkipped { path } if path.ends_with("loop")))
    );
  }
}
