//! Daemon command construction.
//!
//! A [`CommandSpec`] is built from either a runner argv (see [`parse_args`]) or a
//! [`CommandOptions`] value, validated once, and then either serialized back into
//! an argv for the supervisor or resolved and launched by the runner.

mod host;
mod parse;
mod resolve;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use host::HostEnv;
pub use parse::parse_args;

use crate::error::HerderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Start,
  Stop,
}

impl Action {
  #[must_use]
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Start => "start",
      Self::Stop => "stop",
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Action {
  type Err = HerderError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "start" => Ok(Self::Start),
      "stop" => Ok(Self::Stop),
      other => Err(HerderError::Usage(format!(
        "unknown action '{other}': start|stop required"
      ))),
    }
  }
}

/// How the daemon is launched: loaded in-process or exec'd as its own program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  Exec,
  Eval,
}

impl Strategy {
  /// The long flag naming this strategy on the runner command line.
  #[must_use]
  pub fn flag(self) -> &'static str {
    match self {
      Self::Exec => "--exec",
      Self::Eval => "--eval",
    }
  }
}

/// Raw construction inputs, as given by a config record or a parsed argv.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
  pub exec: Option<String>,
  pub eval: Option<String>,
  /// Explicit daemon argv. When set it wins over tokens trailing the target.
  pub args: Option<Vec<String>>,
  pub name: Option<String>,
  pub user: Option<String>,
  pub load_paths: Vec<PathBuf>,
}

/// A validated, immutable description of one daemon invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
  action: Action,
  strategy: Strategy,
  file: PathBuf,
  args: Vec<String>,
  name: String,
  user: Option<String>,
  load_paths: Vec<PathBuf>,
}

impl CommandSpec {
  /// Build against the current process environment.
  ///
  /// # Errors
  /// Returns an error if the working directory is unavailable or validation fails.
  pub fn build(action: Action, options: CommandOptions) -> anyhow::Result<Self> {
    let host = HostEnv::from_process()?;
    Ok(Self::build_in(action, options, &host)?)
  }

  /// Validate `options` and produce a spec. No filesystem or process work happens here.
  ///
  /// # Errors
  /// [`HerderError::Validation`] when both or neither of exec/eval are given, when the
  /// target is empty, or when running as root without a user.
  pub fn build_in(
    action: Action,
    options: CommandOptions,
    host: &HostEnv,
  ) -> Result<Self, HerderError> {
    let CommandOptions {
      exec,
      eval,
      args,
      name,
      user,
      load_paths,
    } = options;

    let (strategy, target) = match (exec, eval) {
      (Some(target), None) => (Strategy::Exec, target),
      (None, Some(target)) => (Strategy::Eval, target),
      _ => {
        return Err(HerderError::Validation(
          "Must have either exec or eval option".to_string(),
        ));
      }
    };

    let mut tokens = target.split_whitespace();
    let Some(file) = tokens.next().map(PathBuf::from) else {
      return Err(HerderError::Validation(format!(
        "{} target is empty",
        strategy.flag()
      )));
    };
    let args = args.unwrap_or_else(|| tokens.map(str::to_string).collect());
    let name = name.unwrap_or_else(|| default_name(&file));

    if user.is_none() && host.running_as_root() {
      return Err(HerderError::Validation(format!(
        "Daemon '{name}': user must be set if running as root"
      )));
    }

    let mut load_paths: Vec<PathBuf> = load_paths
      .into_iter()
      .map(|p| host.absolute(&p))
      .collect();
    dedup_keep_first(&mut load_paths);

    Ok(Self {
      action,
      strategy,
      file,
      args,
      name,
      user,
      load_paths,
    })
  }

  /// Parse a runner argv against the current process environment.
  ///
  /// # Errors
  /// Returns usage or validation errors from parsing and building.
  pub fn from_args(argv: &[String]) -> anyhow::Result<Self> {
    let host = HostEnv::from_process()?;
    Ok(Self::from_args_in(argv, &host)?)
  }

  /// Parse a runner argv, then build it.
  ///
  /// # Errors
  /// [`HerderError::Usage`] for a malformed argv, otherwise as [`Self::build_in`].
  pub fn from_args_in(argv: &[String], host: &HostEnv) -> Result<Self, HerderError> {
    let (action, options) = parse_args(argv)?;
    Self::build_in(action, options, host)
  }

  #[must_use]
  pub fn action(&self) -> Action {
    self.action
  }

  #[must_use]
  pub fn strategy(&self) -> Strategy {
    self.strategy
  }

  /// The target as declared, before any resolution.
  #[must_use]
  pub fn file(&self) -> &Path {
    &self.file
  }

  #[must_use]
  pub fn args(&self) -> &[String] {
    &self.args
  }

  #[must_use]
  pub fn name(&self) -> &str {
    &self.name
  }

  #[must_use]
  pub fn user(&self) -> Option<&str> {
    self.user.as_deref()
  }

  #[must_use]
  pub fn load_paths(&self) -> &[PathBuf] {
    &self.load_paths
  }

  #[must_use]
  pub fn is_exec(&self) -> bool {
    self.strategy == Strategy::Exec
  }

  #[must_use]
  pub fn is_eval(&self) -> bool {
    self.strategy == Strategy::Eval
  }

  /// The daemon's own args behind a `--` separator, or nothing when there are none.
  #[must_use]
  pub fn args_with_separator(&self) -> Vec<String> {
    if self.args.is_empty() {
      return Vec::new();
    }
    std::iter::once("--".to_string())
      .chain(self.args.iter().cloned())
      .collect()
  }
}

fn default_name(file: &Path) -> String {
  file
    .file_name()
    .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned())
}

// Deduplicate while preserving the first occurrence
fn dedup_keep_first(items: &mut Vec<PathBuf>) {
  let mut seen = std::collections::BTreeSet::new();
  items.retain(|p| seen.insert(p.clone()));
}
