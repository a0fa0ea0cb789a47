use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Read a pid file; `Ok(None)` when it does not exist.
pub fn read_pid(path: &Path) -> Result<Option<i32>> {
  let raw = match fs::read_to_string(path) {
    Ok(raw) => raw,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
  };
  let pid = raw
    .trim()
    .parse::<i32>()
    .with_context(|| format!("invalid pid in {}", path.display()))?;
  if pid <= 0 {
    bail!("invalid pid {pid} in {}", path.display());
  }
  Ok(Some(pid))
}

/// Whether a process with `pid` exists (signal 0 probe).
pub fn is_alive(pid: i32) -> bool {
  // 0 and negatives address process groups, not a single daemon.
  if pid <= 0 {
    return false;
  }
  match kill(Pid::from_raw(pid), None) {
    Ok(()) | Err(Errno::EPERM) => !is_zombie(pid),
    Err(_) => false,
  }
}

/// Poll until `pid` has exited or `timeout` elapses. Returns whether it exited.
pub fn wait_for_exit(pid: i32, timeout: Duration) -> bool {
  let start = Instant::now();
  loop {
    if !is_alive(pid) {
      return true;
    }
    if start.elapsed() >= timeout {
      return false;
    }
    thread::sleep(Duration::from_millis(20));
  }
}

// An exited process nobody has reaped yet still answers signal 0.
#[cfg(target_os = "linux")]
fn is_zombie(pid: i32) -> bool {
  let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
    return false;
  };
  // Field 3 follows the parenthesised command name, which may contain spaces.
  stat
    .rsplit_once(')')
    .and_then(|(_, rest)| rest.split_whitespace().next())
    == Some("Z")
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: i32) -> bool {
  false
}
