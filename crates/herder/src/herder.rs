//! The daemon registry: ordered declarations and group start/stop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::command::{Action, CommandOptions, CommandSpec, HostEnv};
use crate::runner::ensure_dir_writable;
use crate::supervisor::{DEFAULT_TIMEOUT, Ping, ProcessSupervisor, SupervisorConfig};
use crate::utils::log::t;
use crate::{log_error, log_info, log_success};

/// Entry-point token prefixed to generated start/stop commands.
pub const DEFAULT_RUNNER: &str = "daemon_runner";

/// One daemon declaration. Unset fields take the herder's defaults.
#[derive(Debug, Clone, Default)]
pub struct DaemonOptions {
  pub command: CommandOptions,
  pub identifier: Option<String>,
  pub log_file: Option<PathBuf>,
  pub pid_file: Option<PathBuf>,
  pub timeout: Option<Duration>,
  pub start_command: Option<String>,
  pub stop_command: Option<String>,
  pub ping: Option<Ping>,
}

impl DaemonOptions {
  /// A declaration that execs `target`.
  #[must_use]
  pub fn exec(target: impl Into<String>) -> Self {
    Self {
      command: CommandOptions {
        exec: Some(target.into()),
        ..Default::default()
      },
      ..Default::default()
    }
  }

  /// A declaration that loads `target` in-process.
  #[must_use]
  pub fn eval(target: impl Into<String>) -> Self {
    Self {
      command: CommandOptions {
        eval: Some(target.into()),
        ..Default::default()
      },
      ..Default::default()
    }
  }
}

/// Owns the ordered supervisor configs for a group of daemons.
///
/// Start order is declaration order; stop order is its exact reverse.
#[derive(Debug)]
pub struct Herder {
  temp_dir: PathBuf,
  runner: String,
  quiet: bool,
  host: HostEnv,
  supervisors: Vec<SupervisorConfig>,
  log_files: Vec<PathBuf>,
}

impl Herder {
  pub fn new(temp_dir: impl Into<PathBuf>, host: HostEnv) -> Self {
    Self {
      temp_dir: temp_dir.into(),
      runner: DEFAULT_RUNNER.to_string(),
      quiet: false,
      host,
      supervisors: Vec::new(),
      log_files: Vec::new(),
    }
  }

  /// A herder for the current process using the system temp dir.
  ///
  /// # Errors
  /// Returns an error if the working directory is unavailable.
  pub fn from_process() -> Result<Self> {
    Ok(Self::new(std::env::temp_dir(), HostEnv::from_process()?))
  }

  #[must_use]
  pub fn with_runner(mut self, runner: impl Into<String>) -> Self {
    self.runner = runner.into();
    self
  }

  #[must_use]
  pub fn with_quiet(mut self, quiet: bool) -> Self {
    self.quiet = quiet;
    self
  }

  #[must_use]
  pub fn temp_dir(&self) -> &Path {
    &self.temp_dir
  }

  #[must_use]
  pub fn runner(&self) -> &str {
    &self.runner
  }

  /// Register a daemon. Nothing is de-duplicated: the same name twice yields two entries.
  ///
  /// Generated commands are built and resolved now, so a bad declaration fails here
  /// rather than at start time.
  ///
  /// # Errors
  /// Validation or resolution failures from building the start/stop commands.
  pub fn declare(&mut self, name: &str, options: DaemonOptions) -> Result<()> {
    let DaemonOptions {
      mut command,
      identifier,
      log_file,
      pid_file,
      timeout,
      start_command,
      stop_command,
      ping,
    } = options;
    command.name = Some(name.to_string());

    let log_file = log_file.unwrap_or_else(|| self.temp_dir.join(format!("{name}.output")));
    let pid_file = pid_file.unwrap_or_else(|| self.temp_dir.join(format!("{name}.pid")));
    let start_command = match start_command {
      Some(cmd) => cmd,
      None => self.command_line(Action::Start, command.clone())?,
    };
    let stop_command = match stop_command {
      Some(cmd) => cmd,
      None => self.command_line(Action::Stop, command)?,
    };

    self.log_files.push(log_file.clone());
    self.supervisors.push(SupervisorConfig {
      identifier: identifier.unwrap_or_else(|| name.to_string()),
      start_command,
      stop_command,
      ping: ping.unwrap_or_default(),
      pid_file,
      log_file,
      timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
    });
    Ok(())
  }

  fn command_line(&self, action: Action, options: CommandOptions) -> Result<String> {
    let spec = CommandSpec::build_in(action, options, &self.host)?;
    Ok(spec.command_line_in(&self.runner, &self.host)?)
  }

  #[must_use]
  pub fn supervisors(&self) -> &[SupervisorConfig] {
    &self.supervisors
  }

  #[must_use]
  pub fn log_files(&self) -> &[PathBuf] {
    &self.log_files
  }

  #[must_use]
  pub fn daemon_count(&self) -> usize {
    self.supervisors.len()
  }

  /// Start every daemon in declaration order.
  ///
  /// The first failure aborts the sequence and is returned unchanged; daemons already
  /// started are left running.
  ///
  /// # Errors
  /// An unwritable temp dir, or the first supervisor failure.
  pub fn start_all<S: ProcessSupervisor>(&self, supervisor: &mut S) -> Result<()> {
    ensure_dir_writable(&self.temp_dir)?;
    for config in &self.supervisors {
      self.say_start("Starting", &config.identifier);
      supervisor.start(config)?;
      self.say_done("Started", &config.identifier);
    }
    Ok(())
  }

  /// Stop every daemon in reverse declaration order.
  ///
  /// Failures do not stop the sweep: every daemon gets a stop attempt, then the first
  /// failure is returned unchanged.
  ///
  /// # Errors
  /// The first supervisor failure encountered.
  pub fn stop_all<S: ProcessSupervisor>(&self, supervisor: &mut S) -> Result<()> {
    let mut first_err = None;
    for config in self.supervisors.iter().rev() {
      self.say_start("Stopping", &config.identifier);
      match supervisor.stop(config) {
        Ok(()) => self.say_done("Stopped", &config.identifier),
        Err(err) => {
          if !self.quiet {
            log_error!("Failed to stop '{}': {:#}", config.identifier, err);
          }
          first_err.get_or_insert(err);
        }
      }
    }
    first_err.map_or(Ok(()), Err)
  }

  fn say_start(&self, verb: &str, identifier: &str) {
    if !self.quiet {
      log_info!("{verb} '{}'...", t::id(identifier));
    }
  }

  fn say_done(&self, verb: &str, identifier: &str) {
    if !self.quiet {
      log_success!("{verb} '{identifier}'");
    }
  }
}
