use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Find the first executable `dir/program` across the entries of a PATH-style value.
#[must_use]
pub(crate) fn search_path(program: &Path, path_var: Option<&OsStr>) -> Option<PathBuf> {
  let paths = path_var?;
  std::env::split_paths(paths)
    .map(|dir| dir.join(program))
    .find(|candidate| is_executable(candidate))
}

/// Returns true when `path` points to a regular executable file.
#[must_use]
pub(crate) fn is_executable(path: &Path) -> bool {
  if !path.is_file() {
    return false;
  }
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::metadata(path)
      .map(|meta| meta.permissions().mode() & 0o111 != 0)
      .unwrap_or(false)
  }
  #[cfg(not(unix))]
  {
    true
  }
}

/// Returns true when the current identity may read `path`.
#[must_use]
pub(crate) fn is_readable(path: &Path) -> bool {
  nix::unistd::access(path, nix::unistd::AccessFlags::R_OK).is_ok()
}

/// Returns true when the current identity may create files in `dir`.
#[must_use]
pub(crate) fn is_writable_dir(dir: &Path) -> bool {
  dir.is_dir() && nix::unistd::access(dir, nix::unistd::AccessFlags::W_OK).is_ok()
}
