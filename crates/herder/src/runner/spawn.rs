use std::fs::{self, File, OpenOptions};
use std::os::unix::process::CommandExt as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use super::{DaemonRunner, LaunchContext, Mode, RunnerOptions};
use crate::error::HerderError;
use crate::utils::pidfile::{is_alive, read_pid, wait_for_exit};
use crate::utils::which::is_executable;

/// Environment variable carrying load paths to in-process daemons.
pub const LOAD_PATH_ENV: &str = "HERDER_LOAD_PATH";

/// How long `stop` waits after SIGTERM before escalating to SIGKILL.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

const KILL_GRACE: Duration = Duration::from_secs(2);

/// Runs daemons as detached children tracked by a pid file in the work directory.
///
/// - `start` spawns the target in its own process group with stdin closed and
///   output appended to `{work_dir}/{app_name}.output`, then records the pid.
/// - `stop` sends SIGTERM to the recorded pid, waits for it to exit (SIGKILL after
///   the stop timeout), then removes the pid file.
#[derive(Debug, Clone, Copy)]
pub struct SpawnRunner {
  stop_timeout: Duration,
}

impl Default for SpawnRunner {
  fn default() -> Self {
    Self {
      stop_timeout: DEFAULT_STOP_TIMEOUT,
    }
  }
}

impl SpawnRunner {
  #[must_use]
  pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
    self.stop_timeout = timeout;
    self
  }

  #[must_use]
  pub fn pid_file(opts: &RunnerOptions) -> PathBuf {
    opts.work_dir.join(format!("{}.pid", opts.app_name))
  }

  #[must_use]
  pub fn log_file(opts: &RunnerOptions) -> PathBuf {
    opts.work_dir.join(format!("{}.output", opts.app_name))
  }

  fn start(target: &str, ctx: &LaunchContext, opts: &RunnerOptions) -> Result<()> {
    let pid_file = Self::pid_file(opts);
    if let Some(pid) = read_pid(&pid_file)? {
      if is_alive(pid) {
        bail!("'{}' is already running (pid {pid})", opts.app_name);
      }
      warn!("removing stale pid file {}", pid_file.display());
      if let Err(err) = fs::remove_file(&pid_file) {
        warn!("failed to remove stale pid file {}: {err}", pid_file.display());
      }
    }

    let daemon_args = daemon_args(&opts.argv);
    let mut cmd = match opts.mode {
      Mode::Exec => {
        let words = shell_words::split(target)
          .with_context(|| format!("invalid command line: {target}"))?;
        let Some((program, rest)) = words.split_first() else {
          bail!("command line is empty");
        };
        let mut cmd = Command::new(program);
        cmd.args(rest);
        cmd
      }
      Mode::Load => {
        if !is_executable(Path::new(target)) {
          return Err(
            HerderError::Resolution(format!(
              "{target} is not executable; in-process daemons are run directly"
            ))
            .into(),
          );
        }
        let mut cmd = Command::new(target);
        if !ctx.load_paths.is_empty() {
          let joined = std::env::join_paths(&ctx.load_paths).context("invalid load path")?;
          cmd.env(LOAD_PATH_ENV, joined);
        }
        cmd
      }
    };
    if let Some(name) = &ctx.process_name {
      cmd.arg0(name);
    }
    cmd.args(daemon_args);
    cmd.stdin(Stdio::null());
    if opts.log_output {
      let log = open_log(&Self::log_file(opts))?;
      cmd.stdout(log.try_clone().context("failed to clone log handle")?);
      cmd.stderr(log);
    } else {
      cmd.stdout(Stdio::null());
      cmd.stderr(Stdio::null());
    }
    cmd.process_group(0);

    let child = cmd
      .spawn()
      .with_context(|| format!("failed to spawn '{}' ({target})", opts.app_name))?;
    let pid = child.id();
    fs::write(&pid_file, format!("{pid}\n"))
      .with_context(|| format!("failed to write {}", pid_file.display()))?;
    info!("started '{}' as pid {pid}", opts.app_name);
    Ok(())
  }

  fn stop(&self, opts: &RunnerOptions) -> Result<()> {
    let pid_file = Self::pid_file(opts);
    let Some(pid) = read_pid(&pid_file)? else {
      warn!("'{}' is not running: no pid file at {}", opts.app_name, pid_file.display());
      return Ok(());
    };

    if signal(pid, Signal::SIGTERM, &opts.app_name)? {
      info!("sent SIGTERM to '{}' (pid {pid})", opts.app_name);
      if !wait_for_exit(pid, self.stop_timeout) {
        warn!(
          "'{}' (pid {pid}) still running after {}s; sending SIGKILL",
          opts.app_name,
          self.stop_timeout.as_secs_f32()
        );
        signal(pid, Signal::SIGKILL, &opts.app_name)?;
        if !wait_for_exit(pid, KILL_GRACE) {
          bail!(
            "'{}' (pid {pid}) did not exit; keeping {}",
            opts.app_name,
            pid_file.display()
          );
        }
      }
    }

    if !opts.keep_pid_files {
      fs::remove_file(&pid_file)
        .with_context(|| format!("failed to remove {}", pid_file.display()))?;
    }
    Ok(())
  }
}

// Ok(false) when the process is already gone.
fn signal(pid: i32, sig: Signal, app_name: &str) -> Result<bool> {
  match kill(Pid::from_raw(pid), sig) {
    Ok(()) => Ok(true),
    Err(Errno::ESRCH) => {
      warn!("'{app_name}' (pid {pid}) already exited");
      Ok(false)
    }
    Err(e) => Err(e).with_context(|| format!("failed to send {sig} to pid {pid}")),
  }
}

impl DaemonRunner for SpawnRunner {
  fn invoke(&mut self, target: &str, ctx: &LaunchContext, opts: &RunnerOptions) -> Result<()> {
    match opts.argv.first().map(String::as_str) {
      Some("start") => Self::start(target, ctx, opts),
      Some("stop") => self.stop(opts),
      other => bail!("unsupported runner action: {other:?}"),
    }
  }
}

fn daemon_args(argv: &[String]) -> &[String] {
  match argv.iter().position(|a| a == "--") {
    Some(idx) => &argv[idx + 1..],
    None => &[],
  }
}

fn open_log(path: &Path) -> Result<File> {
  OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .with_context(|| format!("failed to open {}", path.display()))
}
