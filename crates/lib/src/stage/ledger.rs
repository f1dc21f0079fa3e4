//! The staging ledger.
//!
//! Process-lifetime record of every staging target, used to drive exact,
//! safe cleanup. A target path is recorded at most once; entries marked
//! pre-existing belong to the user and are never deleted. The ledger is an
//! explicit object owned by one coordinator, never ambient state, so
//! independent staging runs in the same process cannot interfere.

use std::path::{Path, PathBuf};

/// What the stager knows about one target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
  /// Where the staged content came from.
  pub source_path: PathBuf,

  /// True when the target already held identical content before this run;
  /// cleanup leaves such paths untouched.
  pub was_pre_existing: bool,
}

/// Ordered ledger of staging targets, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingLedger {
  entries: Vec<(PathBuf, LedgerEntry)>,
}

impl StagingLedger {
  pub fn new() -> Self {
    Self::default()
  }

  /// Whether `target` is already recorded (same-run idempotence check).
  pub fn is_recorded(&self, target: &Path) -> bool {
    self.entries.iter().any(|(t, _)| t == target)
  }

  /// Record a target. A second record for the same path is a no-op: the
  /// first observation of a target is authoritative.
  pub fn record(&mut self, target: PathBuf, source: PathBuf, was_pre_existing: bool) {
    if self.is_recorded(&target) {
      return;
    }
    self.entries.push((
      target,
      LedgerEntry {
        source_path: source,
        was_pre_existing,
      },
    ));
  }

  /// Entries in insertion order.
  pub fn entries(&self) -> impl Iterator<Item = (&Path, &LedgerEntry)> {
    self.entries.iter().map(|(t, e)| (t.as_path(), e))
  }

  /// Number of entries this run actually created (not pre-existing).
  pub fn staged_count(&self) -> usize {
    self.entries.iter().filter(|(_, e)| !e.was_pre_existing).count()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Drop all entries after a completed cleanup.
  pub fn clear(&mut self) {
    self.entries.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn records_each_target_at_most_once() {
    let mut ledger = StagingLedger::new();
    ledger.record(PathBuf::from("/src/a.py"), PathBuf::from("/ext/a.py"), false);
    ledger.record(PathBuf::from("/src/a.py"), PathBuf::from("/other/a.py"), true);

    assert_eq!(ledger.len(), 1);
    let (_, entry) = ledger.entries().next().unwrap();
    // First observation wins.
    assert_eq!(entry.source_path, PathBuf::from("/ext/a.py"));
    assert!(!entry.was_pre_existing);
  }

  #[test]
  fn staged_count_excludes_pre_existing() {
    let mut ledger = StagingLedger::new();
    ledger.record(PathBuf::from("/src/a.py"), PathBuf::from("/ext/a.py"), false);
    ledger.record(PathBuf::from("/src/b.py"), PathBuf::from("/ext/b.py"), true);

    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.staged_count(), 1);
  }

  #[test]
  fn preserves_insertion_order() {
    let mut ledger = StagingLedger::new();
    for name in ["z.py", "a.py", "m.py"] {
      ledger.record(PathBuf::from(name), PathBuf::from("/ext").join(name), false);
    }
    let order: Vec<_> = ledger.entries().map(|(t, _)| t.to_path_buf()).collect();
    assert_eq!(order, vec![PathBuf::from("z.py"), PathBuf::from("a.py"), PathBuf::from("m.py")]);
  }
}
