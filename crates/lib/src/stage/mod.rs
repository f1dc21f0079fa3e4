//! Dependency staging and its exact reversal.
//!
//! The stager copies resolved external dependencies into the source tree,
//! recording every target in the [`StagingLedger`]. Cleanup drains the
//! ledger in reverse insertion order and removes only what this run
//! created, restoring the tree to its pre-staging state.
//!
//! Idempotence rules, in order:
//! - a target already in the ledger is skipped (same-run re-entry);
//! - a target on disk whose content hashes equal to its source is adopted
//!   as pre-existing and never deleted by cleanup;
//! - a target on disk with different content and no ledger entry is a
//!   conflict and aborts the prepare phase before any overwrite.

mod ledger;

pub use ledger::{LedgerEntry, StagingLedger};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::STAGE_EXCLUDE_PREFIXES;
use crate::types::ResolvedDependency;
use crate::util::hash::{HashError, hash_directory, hash_file};

/// Error during staging or cleanup.
#[derive(Debug, Error)]
pub enum StageError {
  /// The target already holds content this engine did not create.
  #[error("staging target already exists with different content: {target}")]
  Conflict { target: PathBuf },

  #[error("failed to create directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to copy {from} to {to}: {source}")]
  Copy {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to remove {path}: {source}")]
  Remove {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read directory {path}: {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),
}

/// Stage one resolved dependency, recording the outcome in the ledger.
///
/// The ledger entry is appended before the next dependency is attempted,
/// so a crash mid-run leaves a ledger usable for partial cleanup.
pub fn stage_dependency(dep: &ResolvedDependency, ledger: &mut StagingLedger) -> Result<(), StageError> {
  if ledger.is_recorded(&dep.target_path) {
    debug!(target = %dep.target_path.display(), "target already in ledger, skipping");
    return Ok(());
  }

  if dep.target_path.exists() {
    if contents_match(&dep.source_path, &dep.target_path, dep.is_directory)? {
      debug!(target = %dep.target_path.display(), "identical copy already present, adopting");
      ledger.record(dep.target_path.clone(), dep.source_path.clone(), true);
      return Ok(());
    }
    return Err(StageError::Conflict {
      target: dep.target_path.clone(),
    });
  }

  if let Some(parent) = dep.target_path.parent()
    && !parent.exists()
  {
    // Intermediate directories made for this target are ours to undo too;
    // the topmost one that did not exist covers the whole chain.
    let created = first_missing_dir(parent);
    fs::create_dir_all(parent).map_err(|e| StageError::CreateDir {
      path: parent.to_path_buf(),
      source: e,
    })?;
    ledger.record(created, dep.source_path.clone(), false);
  }

  if dep.is_directory {
    copy_tree(&dep.source_path, &dep.target_path)?;
  } else {
    fs::copy(&dep.source_path, &dep.target_path).map_err(|e| StageError::Copy {
      from: dep.source_path.clone(),
      to: dep.target_path.clone(),
      source: e,
    })?;
  }

  ledger.record(dep.target_path.clone(), dep.source_path.clone(), false);
  info!(
    source = %dep.source_path.display(),
    target = %dep.target_path.display(),
    "staged external dependency"
  );
  Ok(())
}

/// Reverse staging: remove every ledger target this run created, leave
/// pre-existing entries untouched, then clear the ledger.
///
/// Safe to call when nothing was staged and safe to call twice; the second
/// call no-ops on the empty ledger. Targets are removed in reverse
/// insertion order so nested targets go before their parents.
pub fn cleanup(ledger: &mut StagingLedger) -> Result<(), StageError> {
  let entries: Vec<(PathBuf, LedgerEntry)> = ledger
    .entries()
    .map(|(t, e)| (t.to_path_buf(), e.clone()))
    .collect();

  for (target, entry) in entries.iter().rev() {
    if entry.was_pre_existing {
      debug!(target = %target.display(), "pre-existing, leaving in place");
      continue;
    }
    if !target.exists() {
      continue;
    }

    let result = if target.is_dir() {
      fs::remove_dir_all(target)
    } else {
      fs::remove_file(target)
    };
    result.map_err(|e| StageError::Remove {
      path: target.clone(),
      source: e,
    })?;
    info!(target = %target.display(), "removed staged copy");
  }

  ledger.clear();
  Ok(())
}

/// Topmost ancestor of `path` (inclusive) that does not exist yet.
fn first_missing_dir(path: &Path) -> PathBuf {
  let mut top = path.to_path_buf();
  while let Some(parent) = top.parent() {
    if parent.exists() {
      break;
    }
    top = parent.to_path_buf();
  }
  top
}

/// Whether a dependency's target currently holds the same content as its
/// source. Used to tell adopted or leftover copies from user edits.
pub fn matches_source(dep: &ResolvedDependency) -> Result<bool, StageError> {
  contents_match(&dep.source_path, &dep.target_path, dep.is_directory)
}

/// Whether the existing target holds the same content as the source.
fn contents_match(source: &Path, target: &Path, is_directory: bool) -> Result<bool, StageError> {
  if is_directory {
    if !target.is_dir() {
      return Ok(false);
    }
    let excluded = |name: &str| STAGE_EXCLUDE_PREFIXES.iter().any(|p| name == *p || name.starts_with(p));
    Ok(hash_directory(source, &excluded)? == hash_directory(target, &excluded)?)
  } else {
    if !target.is_file() {
      return Ok(false);
    }
    Ok(hash_file(source)? == hash_file(target)?)
  }
}

/// Recursively copy a directory tree, skipping staging-excluded entries.
///
/// Entries are copied in lexical order for reproducible failure points.
fn copy_tree(src: &Path, dst: &Path) -> Result<(), StageError> {
  fs::create_dir_all(dst).map_err(|e| StageError::CreateDir {
    path: dst.to_path_buf(),
    source: e,
  })?;

  let mut entries: Vec<_> = fs::read_dir(src)
    .map_err(|e| StageError::ReadDir {
      path: src.to_path_buf(),
      source: e,
    })?
    .flatten()
    .map(|e| e.path())
    .collect();
  entries.sort();

  for entry in entries {
    let Some(name) = entry.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
      continue;
    };
    if STAGE_EXCLUDE_PREFIXES.iter().any(|p| name == *p || name.starts_with(p)) {
      continue;
    }

    let dst_entry = dst.join(&name);
    if entry.is_dir() {
      copy_tree(&entry, &dst_entry)?;
    } else {
      fs::copy(&entry, &dst_entry).map_err(|e| StageError::Copy {
        from: entry.clone(),
        to: dst_entry,
        source: e,
      })?;
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::{TempDir, tempdir};

  fn file_dep(temp: &TempDir) -> ResolvedDependency {
    let source = temp.path().join("ext/utils.py");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(&source, "def helper():\n    pass\n").unwrap();
    ResolvedDependency {
      import_name: "utils".to_string(),
      source_path: source,
      target_path: temp.path().join("src/utils.py"),
      is_directory: false,
    }
  }

  fn dir_dep(temp: &TempDir) -> ResolvedDependency {
    let source = temp.path().join("ext/shared");
    fs::create_dir_all(source.join("nested")).unwrap();
    fs::write(source.join("__init__.py"), "").unwrap();
    fs::write(source.join("nested/mod.py"), "x = 1\n").unwrap();
    ResolvedDependency {
      import_name: "shared".to_string(),
      source_path: source,
      target_path: temp.path().join("src/shared"),
      is_directory: true,
    }
  }

  #[test]
  fn stages_a_file_and_records_it() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    let dep = file_dep(&temp);
    let mut ledger = StagingLedger::new();

    stage_dependency(&dep, &mut ledger).unwrap();

    assert!(dep.target_path.is_file());
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.staged_count(), 1);
  }

  #[test]
  fn stages_a_directory_with_exclusions() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    let dep = dir_dep(&temp);
    fs::create_dir(dep.source_path.join("_sandbox")).unwrap();
    fs::write(dep.source_path.join("_sandbox/scratch.py"), "").unwrap();

    let mut ledger = StagingLedger::new();
    stage_dependency(&dep, &mut ledger).unwrap();

    assert!(dep.target_path.join("nested/mod.py").is_file());
    assert!(!dep.target_path.join("_sandbox").exists());
  }

  #[test]
  fn second_stage_of_same_target_is_a_noop() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    let dep = file_dep(&temp);
    let mut ledger = StagingLedger::new();

    stage_dependency(&dep, &mut ledger).unwrap();
    let after_first = ledger.clone();
    stage_dependency(&dep, &mut ledger).unwrap();

    assert_eq!(ledger, after_first);
  }

  #[test]
  fn identical_pre_existing_target_is_adopted_not_copied() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    let dep = file_dep(&temp);
    fs::copy(&dep.source_path, &dep.target_path).unwrap();

    let mut ledger = StagingLedger::new();
    stage_dependency(&dep, &mut ledger).unwrap();

    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.staged_count(), 0);

    // Cleanup must not delete what the user already owned.
    cleanup(&mut ledger).unwrap();
    assert!(dep.target_path.is_file());
  }

  #[test]
  fn differing_pre_existing_target_is_a_conflict() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    let dep = file_dep(&temp);
    fs::write(&dep.target_path, "conflicting user content\n").unwrap();

    let mut ledger = StagingLedger::new();
    let err = stage_dependency(&dep, &mut ledger).unwrap_err();

    assert!(matches!(err, StageError::Conflict { ref target } if *target == dep.target_path));
    // The colliding target is left untouched.
    assert_eq!(fs::read_to_string(&dep.target_path).unwrap(), "conflicting user content\n");
    assert!(ledger.is_empty());
  }

  #[test]
  fn cleanup_removes_staged_copies_and_clears_the_ledger() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    let file = file_dep(&temp);
    let dir = dir_dep(&temp);
    let mut ledger = StagingLedger::new();

    stage_dependency(&file, &mut ledger).unwrap();
    stage_dependency(&dir, &mut ledger).unwrap();
    cleanup(&mut ledger).unwrap();

    assert!(!file.target_path.exists());
    assert!(!dir.target_path.exists());
    assert!(ledger.is_empty());
  }

  #[test]
  fn cleanup_is_safe_on_empty_ledger_and_safe_to_repeat() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    let mut ledger = StagingLedger::new();

    cleanup(&mut ledger).unwrap();

    let dep = file_dep(&temp);
    stage_dependency(&dep, &mut ledger).unwrap();
    cleanup(&mut ledger).unwrap();
    cleanup(&mut ledger).unwrap();
    assert!(!dep.target_path.exists());
  }

  #[test]
  fn cleanup_removes_intermediate_directories_created_for_a_file_target() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    let source = temp.path().join("ext/shared/utils.py");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(&source, "def some_function():\n    pass\n").unwrap();
    let dep = ResolvedDependency {
      import_name: "shared.utils".to_string(),
      source_path: source,
      target_path: temp.path().join("src/shared/utils.py"),
      is_directory: false,
    };

    let mut ledger = StagingLedger::new();
    stage_dependency(&dep, &mut ledger).unwrap();
    assert!(dep.target_path.is_file());
    // The created src/shared directory is recorded alongside the file.
    assert_eq!(ledger.len(), 2);

    cleanup(&mut ledger).unwrap();
    assert!(!temp.path().join("src/shared").exists());
    assert!(temp.path().join("src").is_dir());
  }

  #[test]
  fn cleanup_leaves_pre_existing_parent_directories_in_place() {
    let temp = tempdir().unwrap();
    fs::create_dir_all(temp.path().join("src/shared")).unwrap();
    fs::write(temp.path().join("src/shared/own.py"), "").unwrap();
    let source = temp.path().join("ext/utils.py");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(&source, "x = 1\n").unwrap();
    let dep = ResolvedDependency {
      import_name: "shared.utils".to_string(),
      source_path: source,
      target_path: temp.path().join("src/shared/utils.py"),
      is_directory: false,
    };

    let mut ledger = StagingLedger::new();
    stage_dependency(&dep, &mut ledger).unwrap();
    assert_eq!(ledger.len(), 1);

    cleanup(&mut ledger).unwrap();
    // Only the staged file goes; the user's directory stays.
    assert!(!temp.path().join("src/shared/utils.py").exists());
    assert!(temp.path().join("src/shared/own.py").is_file());
  }

  #[test]
  fn cleanup_removes_nested_targets_before_parents() {
    let temp = tempdir().unwrap();
    fs::create_dir(temp.path().join("src")).unwrap();
    let dir = dir_dep(&temp);
    let mut ledger = StagingLedger::new();
    stage_dependency(&dir, &mut ledger).unwrap();

    // A later dependency staged inside the first one.
    let inner_source = temp.path().join("ext/extra.py");
    fs::write(&inner_source, "y = 2\n").unwrap();
    let inner = ResolvedDependency {
      import_name: "shared.extra".to_string(),
      source_path: inner_source,
      target_path: dir.target_path.join("extra.py"),
      is_directory: false,
    };
    stage_dependency(&inner, &mut ledger).unwrap();

    cleanup(&mut ledger).unwrap();
    assert!(!dir.target_path.exists());
  }
}
