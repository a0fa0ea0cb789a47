//! Hand-off from a validated [`CommandSpec`] to the process that daemonizes it.

mod spawn;

use std::path::{Path, PathBuf};

use log::debug;

pub use spawn::SpawnRunner;

use crate::command::{CommandSpec, HostEnv};
use crate::error::HerderError;
use crate::privilege::{self, Identity, SystemIdentity};
use crate::utils::which::{is_writable_dir, search_path};

/// How the runner brings the target up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  /// The target is loaded by the runner's own process image.
  Load,
  /// The target is a command line to exec.
  Exec,
}

/// Options every runner invocation receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
  pub app_name: String,
  /// `[action]` followed by `-- ARGS...` when the daemon has args.
  pub argv: Vec<String>,
  /// Directory holding pid and output files.
  pub work_dir: PathBuf,
  pub mode: Mode,
  pub log_output: bool,
  pub keep_pid_files: bool,
  pub hard_exit: bool,
}

/// Per-invocation state for in-process launches, scoped to one runner call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
  pub load_paths: Vec<PathBuf>,
  /// Name the daemon process should present, if any.
  pub process_name: Option<String>,
}

/// The detach/pid-file half of running a daemon.
pub trait DaemonRunner {
  /// Start or stop `target` as described by `opts.argv[0]`.
  ///
  /// # Errors
  /// Implementation specific.
  fn invoke(
    &mut self,
    target: &str,
    ctx: &LaunchContext,
    opts: &RunnerOptions,
  ) -> anyhow::Result<()>;
}

/// Host facts for launching: resolution environment plus the work directory.
#[derive(Debug, Clone)]
pub struct LaunchEnv {
  pub host: HostEnv,
  pub temp_dir: PathBuf,
}

impl LaunchEnv {
  /// The current process environment with the system temp dir.
  ///
  /// # Errors
  /// Returns an error if the working directory is unavailable.
  pub fn from_process() -> anyhow::Result<Self> {
    Ok(Self {
      host: HostEnv::from_process()?,
      temp_dir: std::env::temp_dir(),
    })
  }
}

/// Fail unless files can be created in `dir` by the current identity.
///
/// # Errors
/// [`HerderError::Environment`] naming the directory and identity.
pub fn ensure_dir_writable(dir: &Path) -> Result<(), HerderError> {
  if is_writable_dir(dir) {
    return Ok(());
  }
  Err(HerderError::Environment(format!(
    "Cannot write to {} as {}",
    dir.display(),
    privilege::effective_identity()
  )))
}

/// Launch `spec` in the current process environment through `runner`.
///
/// # Errors
/// As [`launch_with`].
pub fn launch<R: DaemonRunner>(spec: &CommandSpec, runner: &mut R) -> anyhow::Result<()> {
  let env = LaunchEnv::from_process()?;
  launch_with(spec, &env, runner, &mut SystemIdentity)
}

/// Launch `spec`: switch identity for in-process daemons, check the work directory,
/// then hand off to `runner`.
///
/// Exec daemons with a user are wrapped in `sudo -u USER --` instead of switching
/// this process.
///
/// # Errors
/// Resolution, privilege and environment failures before the hand-off; runner
/// failures are returned unchanged.
pub fn launch_with<R: DaemonRunner, I: Identity>(
  spec: &CommandSpec,
  env: &LaunchEnv,
  runner: &mut R,
  ids: &mut I,
) -> anyhow::Result<()> {
  // A bare relative program would be looked up on PATH by the spawner; pin it to cwd.
  let file = env.host.absolute(&spec.resolved_file_in(&env.host)?);
  let file_str = file.display().to_string();

  let mut ctx = LaunchContext::default();
  if spec.is_eval() {
    ctx.load_paths = spec.load_paths().to_vec();
    if let Some(user) = spec.user() {
      privilege::switch_to_with(ids, user)?;
    }
    ctx.process_name = Some(file_str.clone());
  }

  ensure_dir_writable(&env.temp_dir)?;

  let target = if spec.is_exec() {
    exec_command(spec, &file_str, &env.host)?
  } else {
    file_str
  };

  let opts = RunnerOptions {
    app_name: spec.name().to_string(),
    argv: std::iter::once(spec.action().to_string())
      .chain(spec.args_with_separator())
      .collect(),
    work_dir: env.temp_dir.clone(),
    mode: if spec.is_eval() { Mode::Load } else { Mode::Exec },
    log_output: true,
    keep_pid_files: false,
    hard_exit: false,
  };
  debug!("invoking runner for {target} with {opts:?}");
  runner.invoke(&target, &ctx, &opts)
}

fn exec_command(spec: &CommandSpec, file: &str, host: &HostEnv) -> Result<String, HerderError> {
  let Some(user) = spec.user() else {
    return Ok(shell_words::quote(file).into_owned());
  };
  let sudo = search_path(Path::new("sudo"), host.search_path())
    .ok_or_else(|| HerderError::Resolution("sudo not found on PATH".to_string()))?;
  Ok(shell_words::join([
    sudo.display().to_string().as_str(),
    "-u",
    user,
    "--",
    file,
  ]))
}
