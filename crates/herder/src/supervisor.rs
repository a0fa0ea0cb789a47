//! Supervisor configuration handed out by the herder, and a command-driven supervisor.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use log::debug;

use crate::utils::pidfile::{is_alive, read_pid};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Liveness predicate for a daemon. Defaults to "always alive".
#[derive(Clone)]
pub struct Ping(Arc<dyn Fn() -> bool + Send + Sync>);

impl Ping {
  pub fn new(check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
    Self(Arc::new(check))
  }

  /// Alive while `argv` exits successfully.
  #[must_use]
  pub fn command(argv: Vec<String>) -> Self {
    Self::new(move || {
      let Some((program, args)) = argv.split_first() else {
        return false;
      };
      Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
    })
  }

  #[must_use]
  pub fn check(&self) -> bool {
    (self.0)()
  }
}

impl Default for Ping {
  fn default() -> Self {
    Self::new(|| true)
  }
}

impl fmt::Debug for Ping {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Ping(..)")
  }
}

/// Everything a supervisor needs to manage one daemon.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
  pub identifier: String,
  pub start_command: String,
  pub stop_command: String,
  pub ping: Ping,
  pub pid_file: PathBuf,
  pub log_file: PathBuf,
  pub timeout: Duration,
}

impl SupervisorConfig {
  /// Whether the pid file names a live process.
  #[must_use]
  pub fn is_running(&self) -> bool {
    matches!(read_pid(&self.pid_file), Ok(Some(pid)) if is_alive(pid))
  }
}

/// Starts and stops single daemons. Both calls block until done or failed.
pub trait ProcessSupervisor {
  /// # Errors
  /// Implementation specific; the herder propagates it unchanged.
  fn start(&mut self, config: &SupervisorConfig) -> Result<()>;

  /// # Errors
  /// Implementation specific; the herder propagates it unchanged.
  fn stop(&mut self, config: &SupervisorConfig) -> Result<()>;
}

/// Runs the configured start/stop command lines and polls the pid file.
///
/// - start: command must succeed, then the pid file must appear and ping pass.
/// - stop: command must succeed, then the pid file must disappear.
///
/// Both give up after the configured timeout.
#[derive(Debug, Default, Clone)]
pub struct CommandSupervisor {
  envs: Vec<(OsString, OsString)>,
}

impl CommandSupervisor {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Set an environment variable for every start/stop command.
  #[must_use]
  pub fn with_env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
    self
      .envs
      .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
    self
  }

  fn run_command_line(&self, line: &str, identifier: &str) -> Result<()> {
    let words =
      shell_words::split(line).with_context(|| format!("invalid command line: {line}"))?;
    let Some((program, args)) = words.split_first() else {
      bail!("command for '{identifier}' is empty");
    };
    debug!("running {line}");
    let status = Command::new(program)
      .args(args)
      .envs(self.envs.iter().map(|(k, v)| (k, v)))
      .stdin(Stdio::null())
      .status()
      .with_context(|| format!("failed to run {program} for '{identifier}'"))?;
    if !status.success() {
      bail!("command for '{identifier}' failed: status={status}");
    }
    Ok(())
  }
}

impl ProcessSupervisor for CommandSupervisor {
  fn start(&mut self, config: &SupervisorConfig) -> Result<()> {
    self.run_command_line(&config.start_command, &config.identifier)?;
    let ready = poll_until(config.timeout, || {
      config.pid_file.exists() && config.ping.check()
    });
    if !ready {
      bail!(
        "Daemon '{}' did not start within {}s; see {}",
        config.identifier,
        config.timeout.as_secs_f32(),
        config.log_file.display()
      );
    }
    Ok(())
  }

  fn stop(&mut self, config: &SupervisorConfig) -> Result<()> {
    self.run_command_line(&config.stop_command, &config.identifier)?;
    if !poll_until(config.timeout, || !config.pid_file.exists()) {
      bail!(
        "Daemon '{}' did not stop within {}s; pid file {} still present",
        config.identifier,
        config.timeout.as_secs_f32(),
        config.pid_file.display()
      );
    }
    Ok(())
  }
}

fn poll_until(timeout: Duration, mut ready: impl FnMut() -> bool) -> bool {
  let start = Instant::now();
  loop {
    if ready() {
      return true;
    }
    if start.elapsed() >= timeout {
      return false;
    }
    thread::sleep(POLL_INTERVAL);
  }
}
