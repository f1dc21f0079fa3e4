//! Five-way origin classification of import declarations.
//!
//! Checks are applied in a fixed precedence, first match wins:
//!
//! 1. relative-import syntax is unambiguous evidence of intent and
//!    short-circuits: local when the target lies inside the source dir,
//!    external otherwise;
//! 2. standard-library names (checked before third-party to avoid
//!    shadowing false positives);
//! 3. installed third-party packages, unless the same name is present
//!    inside the source dir;
//! 4. a file or directory inside the source dir;
//! 5. a backing path under the project root but outside the source dir;
//! 6. ambiguous.
//!
//! Classification is total: every declaration receives exactly one
//! category, and non-fatal oddities surface as warnings, never as errors.

mod registry;
mod stdlib;

pub use registry::PackageRegistry;
pub use stdlib::is_stdlib_module;

use std::path::{Path, PathBuf};

use tracing::trace;

use crate::consts::PY_EXTENSION;
use crate::resolve::Resolver;
use crate::types::{Classification, ImportDeclaration, Warning};

/// Assigns each declaration its origin category.
#[derive(Debug, Clone)]
pub struct Classifier {
  src_dir: PathBuf,
  registry: PackageRegistry,
  resolver: Resolver,
}

impl Classifier {
  pub fn new(project_root: &Path, src_dir: &Path, registry: PackageRegistry) -> Self {
    Self {
      src_dir: src_dir.to_path_buf(),
      registry,
      resolver: Resolver::new(project_root, src_dir),
    }
  }

  /// Classify one declaration, appending any shadowing or ambiguity
  /// warnings to `warnings`.
  pub fn classify(&self, decl: &ImportDeclaration, warnings: &mut Vec<Warning>) -> Classification {
    let classification = self.classify_inner(decl, warnings);
    trace!(
      module = %decl.module_path,
      level = decl.relative_level,
      classification = %classification,
      "classified import"
    );
    classification
  }

  fn classify_inner(&self, decl: &ImportDeclaration, warnings: &mut Vec<Warning>) -> Classification {
    // 1. Relative-import syntax short-circuits everything else.
    if decl.relative_level > 0 {
      return if self.relative_target_in_src(decl) {
        Classification::Local
      } else {
        Classification::External
      };
    }

    let Some(top) = decl.top_level() else {
      // An absolute import always has a top-level component; an empty one
      // can only come from malformed input that slipped through.
      self.push_ambiguous(decl, warnings);
      return Classification::Ambiguous;
    };

    // 2. Standard library.
    if is_stdlib_module(top) {
      return Classification::Stdlib;
    }

    // 3. Installed packages, unless shadowed by the source dir itself.
    if self.registry.contains(top) && !exists_in_dir(&self.src_dir, top) {
      // A same-named path elsewhere in the project is ambiguous intent;
      // the installed package wins, but say so.
      if let Some((project_path, _)) = self.resolver.locate(decl) {
        warnings.push(Warning::ShadowedPackage {
          module_path: decl.module_path.clone(),
          project_path,
        });
      }
      return Classification::ThirdParty;
    }

    // 4. Inside the source dir.
    if exists_in_dir(&self.src_dir, top) {
      return Classification::Local;
    }

    // 5. Under the project root but outside the source dir.
    if self.resolver.locate(decl).is_some() {
      return Classification::External;
    }

    // 6. Nothing matched.
    self.push_ambiguous(decl, warnings);
    Classification::Ambiguous
  }

  fn push_ambiguous(&self, decl: &ImportDeclaration, warnings: &mut Vec<Warning>) {
    warnings.push(Warning::AmbiguousImport {
      module_path: decl.module_path.clone(),
      file: decl.declaring_file.clone(),
      line: decl.line_number,
    });
  }

  /// Whether the base directory a relative import resolves against lies
  /// inside the source dir.
  fn relative_target_in_src(&self, decl: &ImportDeclaration) -> bool {
    let Some(parent) = decl.declaring_file.parent() else {
      return false;
    };
    let mut base = parent.to_path_buf();
    for _ in 1..decl.relative_level {
      match base.parent() {
        Some(p) => base = p.to_path_buf(),
        None => return false,
      }
    }
    for part in decl.components() {
      base.push(part);
    }
    base.starts_with(&self.src_dir)
  }
}

/// A top-level component "exists in a directory" when it is a module file
/// or any directory of that name.
fn exists_in_dir(dir: &Path, top: &str) -> bool {
  dir.join(format!("{}.{}", top, PY_EXTENSION)).is_file() || dir.join(top).is_dir()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::{TempDir, tempdir};

  fn decl(module_path: &str, level: u32, file: PathBuf) -> ImportDeclaration {
    ImportDeclaration {
      module_path: module_path.to_string(),
      imported_symbols: Vec::new(),
      relative_level: level,
      declaring_file: file,
      line_number: 7,
    }
  }

  /// Project with a src package, a shared/ tree outside src, and a fake
  /// site-packages with one installed package.
  fn project() -> (TempDir, Classifier, PathBuf) {
    let temp = tempdir().unwrap();
    let root = temp.path().to_path_buf();
    let src = root.join("src");
    fs::create_dir_all(src.join("mypkg")).unwrap();
    fs::write(src.join("mypkg/__init__.py"), "").unwrap();
    fs::write(src.join("mypkg/main.py"), "").unwrap();
    fs::write(src.join("mypkg/sibling.py"), "").unwrap();

    fs::create_dir(root.join("shared")).unwrap();
    fs::write(root.join("shared/__init__.py"), "").unwrap();
    fs::write(root.join("shared/utils.py"), "").unwrap();

    let site = root.join("site-packages");
    fs::create_dir(&site).unwrap();
    fs::create_dir(site.join("requests")).unwrap();
    fs::write(site.join("requests/__init__.py"), "").unwrap();

    let registry = PackageRegistry::from_roots(vec![site]);
    let classifier = Classifier::new(&root, &src, registry);
    let declaring = src.join("mypkg/main.py");
    (temp, classifier, declaring)
  }

  fn classify(classifier: &Classifier, d: &ImportDeclaration) -> (Classification, Vec<Warning>) {
    let mut warnings = Vec::new();
    let c = classifier.classify(d, &mut warnings);
    (c, warnings)
  }

  #[test]
  fn stdlib_import() {
    let (_t, classifier, file) = project();
    let (c, w) = classify(&classifier, &decl("os", 0, file));
    assert_eq!(c, Classification::Stdlib);
    assert!(w.is_empty());
  }

  #[test]
  fn stdlib_wins_over_installed_package_of_same_name() {
    let (_t, classifier, file) = project();
    // `json` is stdlib even though a project could install a json package.
    let (c, _) = classify(&classifier, &decl("json.decoder", 0, file));
    assert_eq!(c, Classification::Stdlib);
  }

  #[test]
  fn installed_package_is_third_party() {
    let (_t, classifier, file) = project();
    let (c, w) = classify(&classifier, &decl("requests", 0, file));
    assert_eq!(c, Classification::ThirdParty);
    assert!(w.is_empty());
  }

  #[test]
  fn relative_import_inside_src_is_local() {
    let (_t, classifier, file) = project();
    let (c, _) = classify(&classifier, &decl("", 1, file));
    assert_eq!(c, Classification::Local);
  }

  #[test]
  fn relative_import_escaping_src_is_external() {
    let (_t, classifier, file) = project();
    // Three dots from src/mypkg/main.py lands at the project root.
    let (c, _) = classify(&classifier, &decl("shared", 3, file));
    assert_eq!(c, Classification::External);
  }

  #[test]
  fn module_in_src_is_local() {
    let (_t, classifier, file) = project();
    let (c, _) = classify(&classifier, &decl("mypkg.sibling", 0, file));
    assert_eq!(c, Classification::Local);
  }

  #[test]
  fn module_outside_src_is_external() {
    let (_t, classifier, file) = project();
    let (c, w) = classify(&classifier, &decl("shared.utils", 0, file));
    assert_eq!(c, Classification::External);
    assert!(w.is_empty());
  }

  #[test]
  fn unknown_name_is_ambiguous_with_warning() {
    let (_t, classifier, file) = project();
    let (c, w) = classify(&classifier, &decl("nowhere", 0, file));
    assert_eq!(c, Classification::Ambiguous);
    assert!(matches!(
      &w[0],
      Warning::AmbiguousImport { module_path, line: 7, .. } if module_path == "nowhere"
    ));
  }

  #[test]
  fn installed_package_shadowed_by_project_file_warns_but_wins() {
    let (temp, _c, file) = project();
    let root = temp.path().to_path_buf();
    // A project directory named like the installed package.
    fs::create_dir(root.join("requests")).unwrap();
    fs::write(root.join("requests/__init__.py"), "").unwrap();

    let registry = PackageRegistry::from_roots(vec![root.join("site-packages")]);
    let classifier = Classifier::new(&root, &root.join("src"), registry);

    let (c, w) = classify(&classifier, &decl("requests", 0, file));
    assert_eq!(c, Classification::ThirdParty);
    assert!(matches!(&w[0], Warning::ShadowedPackage { module_path, .. } if module_path == "requests"));
  }

  #[test]
  fn src_file_shadowing_installed_package_is_local() {
    let (temp, _c, file) = project();
    let root = temp.path().to_path_buf();
    let src = root.join("src");
    // The package name exists inside src itself: src wins over site-packages.
    fs::write(src.join("requests.py"), "").unwrap();

    let registry = PackageRegistry::from_roots(vec![root.join("site-packages")]);
    let classifier = Classifier::new(&root, &src, registry);

    let (c, _) = classify(&classifier, &decl("requests", 0, file));
    assert_eq!(c, Classification::Local);
  }

  #[test]
  fn classification_is_total() {
    let (_t, classifier, file) = project();
    let samples = [
      decl("os", 0, file.clone()),
      decl("requests", 0, file.clone()),
      decl("mypkg.sibling", 0, file.clone()),
      decl("shared.utils", 0, file.clone()),
      decl("mystery", 0, file.clone()),
      decl("", 2, file),
    ];
    let mut warnings = Vec::new();
    for d in &samples {
      // Every declaration gets exactly one category; none panics or skips.
      let _ = classifier.classify(d, &mut warnings);
    }
  }
}
