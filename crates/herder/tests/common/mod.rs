#![allow(dead_code)]
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::{Builder, TempDir};

/// Scratch dirs live under the workspace target dir, not the system temp dir.
pub fn tmp_root() -> PathBuf {
  let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
  // Walk two parents up: crates/herder -> crates -> workspace root
  let workspace_root = manifest_dir
    .parent()
    .and_then(|p| p.parent())
    .unwrap_or(&manifest_dir)
    .to_path_buf();
  let root = workspace_root.join("target").join("test-tmp");
  let _ = std::fs::create_dir_all(&root);
  root
}

pub fn tempdir() -> TempDir {
  Builder::new()
    .prefix("herder-test-")
    .tempdir_in(tmp_root())
    .expect("temp dir")
}

pub fn runner_bin() -> &'static str {
  env!("CARGO_BIN_EXE_daemon_runner")
}

/// `daemon_runner` running in `dir`, with `TMPDIR` pointing at `dir/tmp`.
pub fn runner(dir: &Path) -> Command {
  let tmp = dir.join("tmp");
  let _ = std::fs::create_dir_all(&tmp);
  let mut cmd = Command::new(runner_bin());
  cmd.current_dir(dir).env("TMPDIR", &tmp).env_remove("RUST_LOG");
  cmd
}

/// `herder` running in `dir` with no config discovery outside it.
pub fn herder(dir: &Path) -> Command {
  let mut cmd = Command::new(env!("CARGO_BIN_EXE_herder"));
  cmd
    .current_dir(dir)
    .env_remove("HERDER_CONFIG")
    .env("XDG_CONFIG_HOME", dir.join("xdg"))
    .env_remove("RUST_LOG");
  cmd
}

/// Write an executable `#!/bin/sh` script into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  use std::os::unix::fs::PermissionsExt as _;
  let path = dir.join(name);
  std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
  std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod script");
  path
}

pub fn running_as_root() -> bool {
  nix::unistd::geteuid().is_root()
}

/// Wait for a condition with a short poll interval.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
  let start = std::time::Instant::now();
  while start.elapsed() < std::time::Duration::from_secs(5) {
    if cond() {
      return true;
    }
    std::thread::sleep(std::time::Duration::from_millis(50));
  }
  false
}
