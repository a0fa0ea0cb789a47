use std::path::PathBuf;

use log::debug;

use super::parse::quote_name;
use super::{CommandSpec, HostEnv, Strategy};
use crate::error::HerderError;
use crate::utils::which::{is_executable, is_readable, search_path};

// Position of the pre-quoted name in `to_args_in` output.
const NAME_INDEX: usize = 2;

impl CommandSpec {
  /// Resolve the target file the daemon will actually run.
  ///
  /// - Exec: an executable or absolute target is used verbatim; otherwise the first
  ///   executable match on the search path wins, falling back to the literal target.
  /// - Eval: the target anchored at the working directory.
  ///
  /// # Errors
  /// [`HerderError::Resolution`] if the result does not exist or is not readable.
  pub fn resolved_file_in(&self, host: &HostEnv) -> Result<PathBuf, HerderError> {
    let file = match self.strategy {
      Strategy::Exec => {
        if self.file.is_absolute() || is_executable(&host.absolute(&self.file)) {
          self.file.clone()
        } else {
          search_path(&self.file, host.search_path()).unwrap_or_else(|| self.file.clone())
        }
      }
      Strategy::Eval => host.absolute(&self.file),
    };

    let on_disk = host.absolute(&file);
    if file.as_os_str().is_empty() || !on_disk.exists() || !is_readable(&on_disk) {
      return Err(HerderError::Resolution(format!(
        "{} does not exist or is not readable",
        file.display()
      )));
    }
    debug!("resolved {} -> {}", self.file.display(), file.display());
    Ok(file)
  }

  /// Resolve against the current process environment.
  ///
  /// # Errors
  /// As [`Self::resolved_file_in`], or if the working directory is unavailable.
  pub fn resolved_file(&self) -> anyhow::Result<PathBuf> {
    let host = HostEnv::from_process()?;
    Ok(self.resolved_file_in(&host)?)
  }

  /// Serialize into a runner argv that parses back into an equivalent spec.
  ///
  /// Layout: `[action, --name, 'NAME', --STRATEGY, FILE]`, then `--user USER`, then
  /// `-I PATH` per load path, then `-- ARGS...` when the daemon has args.
  ///
  /// # Errors
  /// [`HerderError::Resolution`] if the target cannot be resolved.
  pub fn to_args_in(&self, host: &HostEnv) -> Result<Vec<String>, HerderError> {
    let file = self.resolved_file_in(host)?;
    let mut args = vec![
      self.action.to_string(),
      "--name".to_string(),
      quote_name(&self.name),
      self.strategy.flag().to_string(),
      file.display().to_string(),
    ];
    if let Some(user) = &self.user {
      args.extend(["--user".to_string(), user.clone()]);
    }
    for path in &self.load_paths {
      args.extend(["-I".to_string(), path.display().to_string()]);
    }
    args.extend(self.args_with_separator());
    Ok(args)
  }

  /// Serialize against the current process environment.
  ///
  /// # Errors
  /// As [`Self::to_args_in`], or if the working directory is unavailable.
  pub fn to_args(&self) -> anyhow::Result<Vec<String>> {
    let host = HostEnv::from_process()?;
    Ok(self.to_args_in(&host)?)
  }

  /// Render a shell command line: `runner` followed by the serialized argv.
  ///
  /// The runner token is emitted verbatim so it may carry its own arguments; every
  /// other token is shell-quoted as needed.
  ///
  /// # Errors
  /// As [`Self::to_args_in`].
  pub fn command_line_in(&self, runner: &str, host: &HostEnv) -> Result<String, HerderError> {
    let args = self.to_args_in(host)?;
    let mut line = vec![runner.to_string()];
    for (idx, arg) in args.iter().enumerate() {
      if idx == NAME_INDEX {
        line.push(arg.clone());
      } else {
        line.push(shell_words::quote(arg).into_owned());
      }
    }
    Ok(line.join(" "))
  }
}
