//! Installed third-party package registry.
//!
//! Enumerates top-level importable names from site-packages directories so
//! the classifier can tell installed packages from project modules without
//! running an interpreter. Roots are discovered from explicit
//! configuration, the `VIRTUAL_ENV` environment variable, and the
//! conventional `.venv`/`venv` directories under the project root.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::{EGG_INFO_SUFFIX, INIT_FILE, PY_EXTENSION};

const DIST_INFO_SUFFIX: &str = ".dist-info";

/// Top-level names importable from the interpreter's installed packages.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
  roots: Vec<PathBuf>,
  names: BTreeSet<String>,
}

impl PackageRegistry {
  /// Registry with no installed packages.
  pub fn empty() -> Self {
    Self::default()
  }

  /// Build a registry from explicit site-packages roots.
  pub fn from_roots(roots: Vec<PathBuf>) -> Self {
    let mut names = BTreeSet::new();
    for root in &roots {
      collect_top_level_names(root, &mut names);
    }
    debug!(roots = roots.len(), names = names.len(), "package registry built");
    Self { roots, names }
  }

  /// Discover site-packages roots for a project and build the registry.
  ///
  /// Looks at `extra_roots`, then `$VIRTUAL_ENV`, then `.venv`/`venv`
  /// under the project root. Missing candidates are silently ignored.
  pub fn discover(project_root: &Path, extra_roots: &[PathBuf]) -> Self {
    let mut roots: Vec<PathBuf> = extra_roots.to_vec();

    let mut venvs: Vec<PathBuf> = Vec::new();
    if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
      venvs.push(PathBuf::from(venv));
    }
    venvs.push(project_root.join(".venv"));
    venvs.push(project_root.join("venv"));

    for venv in venvs {
      roots.extend(site_packages_in_venv(&venv));
    }

    roots.retain(|r| r.is_dir());
    roots.sort();
    roots.dedup();

    Self::from_roots(roots)
  }

  /// Returns true if `name` is importable from the installed packages.
  pub fn contains(&self, name: &str) -> bool {
    self.names.contains(name)
  }

  /// The site-packages roots backing this registry.
  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }
}

/// Locate site-packages directories inside a virtualenv.
fn site_packages_in_venv(venv: &Path) -> Vec<PathBuf> {
  let mut found = Vec::new();

  // Unix layout: <venv>/lib/python3.x/site-packages
  let lib = venv.join("lib");
  if let Ok(entries) = fs::read_dir(&lib) {
    let mut candidates: Vec<PathBuf> = entries
      .flatten()
      .map(|e| e.path())
      .filter(|p| {
        p.file_name()
          .and_then(|n| n.to_str())
          .map(|n| n.starts_with("python"))
          .unwrap_or(false)
      })
      .map(|p| p.join("site-packages"))
      .filter(|p| p.is_dir())
      .collect();
    candidates.sort();
    found.extend(candidates);
  }

  // Windows layout: <venv>/Lib/site-packages
  let windows_site = venv.join("Lib").join("site-packages");
  if windows_site.is_dir() {
    found.push(windows_site);
  }

  found
}

/// Collect importable top-level names from one site-packages directory.
///
/// Counts `.py` module files, package directories, and compiled extension
/// modules; skips packaging metadata.
fn collect_top_level_names(root: &Path, names: &mut BTreeSet<String>) {
  let Ok(entries) = fs::read_dir(root) else {
    return;
  };

  for entry in entries.flatten() {
    let path = entry.path();
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
      continue;
    };

    if file_name.ends_with(DIST_INFO_SUFFIX) || file_name.ends_with(EGG_INFO_SUFFIX) || file_name == "__pycache__" {
      continue;
    }

    if path.is_dir() {
      // A directory is importable when it is a package or a namespace dir.
      if path.join(INIT_FILE).exists() || dir_contains_python(&path) {
        names.insert(file_name.to_string());
      }
      continue;
    }

    if let Some(stem) = file_name.strip_suffix(&format!(".{}", PY_EXTENSION)) {
      names.insert(stem.to_string());
      continue;
    }

    // Extension modules: foo.cpython-312-x86_64-linux-gnu.so, foo.pyd
    if file_name.ends_with(".so") || file_name.ends_with(".pyd") {
      if let Some(top) = file_name.split('.').next()
        && !top.is_empty()
      {
        names.insert(top.to_string());
      }
    }
  }
}

fn dir_contains_python(dir: &Path) -> bool {
  fs::read_dir(dir)
    .map(|entries| {
      entries.flatten().any(|e| {
        e.path().extension().and_then(|x| x.to_str()) == Some(PY_EXTENSION)
          || e.path().join(INIT_FILE).exists()
      })
    })
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn enumerates_modules_packages_and_extensions() {
    let temp = tempdir().unwrap();
    let site = temp.path().join("site-packages");
    fs::create_dir_all(site.join("requests")).unwrap();
    fs::write(site.join("requests").join(INIT_FILE), "").unwrap();
    fs::write(site.join("six.py"), "").unwrap();
    fs::write(site.join("_yaml.cpython-312-x86_64-linux-gnu.so"), "").unwrap();
    fs::create_dir(site.join("requests-2.31.0.dist-info")).unwrap();
    fs::create_dir(site.join("__pycache__")).unwrap();

    let registry = PackageRegistry::from_roots(vec![site]);
    assert!(registry.contains("requests"));
    assert!(registry.contains("six"));
    assert!(registry.contains("_yaml"));
    assert!(!registry.contains("requests-2.31.0.dist-info"));
    assert!(!registry.contains("__pycache__"));
  }

  #[test]
  fn discovers_project_local_venv() {
    let temp = tempdir().unwrap();
    let site = temp.path().join(".venv/lib/python3.12/site-packages");
    fs::create_dir_all(&site).unwrap();
    fs::write(site.join("numpy.py"), "").unwrap();

    let registry = PackageRegistry::discover(temp.path(), &[]);
    assert!(registry.contains("numpy"));
    assert!(!registry.contains("pandas"));
  }

  #[test]
  fn empty_registry_contains_nothing() {
    assert!(!PackageRegistry::empty().contains("requests"));
  }
}
