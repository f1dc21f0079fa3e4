//! Shared constants.

/// File extension of Python source files, without the dot.
pub const PY_EXTENSION: &str = "py";

/// Initializer file that marks a directory as a Python package.
pub const INIT_FILE: &str = "__init__.py";

/// Conventional project manifest used to locate the project root.
pub const PROJECT_MANIFEST: &str = "pyproject.toml";

/// Conventional source directory name under the project root.
pub const SRC_DIR_NAME: &str = "src";

/// Directory names pruned during source scanning.
///
/// These hold generated or third-party content and never contain project
/// sources worth analyzing.
pub const SCAN_EXCLUDES: &[&str] = &[
  ".venv",
  "venv",
  "__pycache__",
  ".git",
  ".pytest_cache",
  ".mypy_cache",
  "node_modules",
  ".tox",
  "dist",
  "build",
];

/// Suffix marking packaging metadata directories, also pruned when scanning.
pub const EGG_INFO_SUFFIX: &str = ".egg-info";

/// Path-component prefixes excluded from dependency staging.
///
/// A component matches when it equals a prefix or starts with it, so
/// `_sandbox_v2` is excluded by `_sandbox`.
pub const STAGE_EXCLUDE_PREFIXES: &[&str] = &[
  "_SS",
  "__SS",
  "_sandbox",
  "__sandbox",
  "_skip",
  "__skip",
  "_test",
  "__test__",
];

/// Returns true if any component of `path` matches a staging exclusion prefix.
pub fn is_stage_excluded(path: &std::path::Path) -> bool {
  path.components().any(|c| {
    c.as_os_str()
      .to_str()
      .map(|name| STAGE_EXCLUDE_PREFIXES.iter().any(|p| name == *p || name.starts_with(p)))
      .unwrap_or(false)
  })
}
