use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Host facts consulted while building and resolving commands.
/// - `cwd`: base for relative eval targets and load paths.
/// - `search_path`: PATH-style value searched for unqualified exec targets.
/// - `running_as_root`: whether the effective uid is 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnv {
  cwd: PathBuf,
  search_path: Option<OsString>,
  running_as_root: bool,
}

impl HostEnv {
  pub fn new(cwd: impl Into<PathBuf>, search_path: Option<OsString>, running_as_root: bool) -> Self {
    Self {
      cwd: cwd.into(),
      search_path,
      running_as_root,
    }
  }

  /// Snapshot of the current process: working dir, `PATH` and effective uid.
  ///
  /// # Errors
  /// Returns an error if the current directory cannot be determined.
  pub fn from_process() -> Result<Self> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(Self::new(
      cwd,
      std::env::var_os("PATH"),
      crate::privilege::running_as_root(),
    ))
  }

  #[must_use]
  pub fn cwd(&self) -> &Path {
    &self.cwd
  }

  #[must_use]
  pub fn search_path(&self) -> Option<&OsStr> {
    self.search_path.as_deref()
  }

  #[must_use]
  pub fn running_as_root(&self) -> bool {
    self.running_as_root
  }

  /// Anchor a relative path at `cwd`; absolute paths pass through.
  #[must_use]
  pub fn absolute(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.cwd.join(path)
    }
  }
}
