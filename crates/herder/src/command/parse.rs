use std::path::PathBuf;

use clap::Parser;

use super::{Action, CommandOptions};
use crate::error::HerderError;

/// Runner argv grammar, minus the `--` tail which is split off before clap sees it.
#[derive(Debug, Parser)]
#[command(name = "daemon_runner", no_binary_name = true, disable_version_flag = true)]
struct RunnerArgs {
  /// start or stop
  action: Option<String>,
  /// Run daemon by loading FILE in-process
  #[arg(long, value_name = "FILE")]
  eval: Option<String>,
  /// Run daemon by executing FILE
  #[arg(long, value_name = "FILE")]
  exec: Option<String>,
  /// Give the daemon a name
  #[arg(long)]
  name: Option<String>,
  /// Execute as USER
  #[arg(long)]
  user: Option<String>,
  /// Add PATH to the daemon's load paths
  #[arg(short = 'I', value_name = "PATH")]
  load_paths: Vec<PathBuf>,
}

/// Split a runner argv into its action and raw options.
///
/// Everything after the first literal `--` is the daemon's own argv and is never
/// flag-parsed. The action may appear anywhere among the flags.
///
/// # Errors
/// [`HerderError::Usage`] when the action is missing or unknown, or a flag is malformed.
pub fn parse_args(argv: &[String]) -> Result<(Action, CommandOptions), HerderError> {
  let (head, tail) = match argv.iter().position(|a| a == "--") {
    Some(idx) => (&argv[..idx], Some(argv[idx + 1..].to_vec())),
    None => (argv, None),
  };

  let parsed = RunnerArgs::try_parse_from(head)
    .map_err(|err| HerderError::Usage(err.to_string().trim_end().to_string()))?;

  let action: Action = parsed
    .action
    .as_deref()
    .ok_or_else(|| HerderError::Usage("start|stop required".to_string()))?
    .parse()?;

  Ok((
    action,
    CommandOptions {
      exec: parsed.exec,
      eval: parsed.eval,
      args: tail,
      name: parsed.name.map(|n| unquote_name(&n)),
      user: parsed.user,
      load_paths: parsed.load_paths,
    },
  ))
}

/// Quote a daemon name with single quotes, the form serialized argvs carry.
pub(crate) fn quote_name(name: &str) -> String {
  format!("'{}'", name.replace('\'', r"'\''"))
}

// Serialized argvs carry the name single-quoted. A shell strips the quotes before
// the runner sees them; a direct argv hand-off does not, so undo them here.
fn unquote_name(raw: &str) -> String {
  match raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
    Some(inner) => inner.replace(r"'\''", "'"),
    None => raw.to_string(),
  }
}
