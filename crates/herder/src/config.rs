use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize as _;
use serde::Deserialize;
use toml::Value as TomlValue;

use crate::command::{CommandOptions, HostEnv};
use crate::herder::{DEFAULT_RUNNER, DaemonOptions, Herder};
use crate::supervisor::Ping;

/// Known top-level config keys.
const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["temp_dir", "runner", "quiet", "daemon"];

/// Known keys within each `[[daemon]]` record.
const KNOWN_DAEMON_KEYS: &[&str] = &[
  "name",
  "exec",
  "eval",
  "args",
  "user",
  "load_paths",
  "identifier",
  "log_file",
  "pid_file",
  "timeout",
  "start_command",
  "stop_command",
  "ping_command",
];

/// Default file name looked up in the working directory and the XDG config home.
pub const CONFIG_FILE_NAME: &str = "herd.toml";

/// Herd file template with every option commented out.
pub const HERD_TEMPLATE: &str =
  include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/defaults/herd.toml"));

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DaemonDecl {
  pub name: String,
  #[serde(default)]
  pub exec: Option<String>,
  #[serde(default)]
  pub eval: Option<String>,
  #[serde(default)]
  pub args: Option<Vec<String>>,
  #[serde(default)]
  pub user: Option<String>,
  #[serde(default)]
  pub load_paths: Vec<PathBuf>,
  #[serde(default)]
  pub identifier: Option<String>,
  #[serde(default)]
  pub log_file: Option<PathBuf>,
  #[serde(default)]
  pub pid_file: Option<PathBuf>,
  /// Seconds the supervisor waits for start/stop.
  #[serde(default)]
  pub timeout: Option<u64>,
  #[serde(default)]
  pub start_command: Option<String>,
  #[serde(default)]
  pub stop_command: Option<String>,
  /// Argv whose success means the daemon is alive.
  #[serde(default)]
  pub ping_command: Option<Vec<String>>,
}

impl DaemonDecl {
  fn validate(&self, idx: usize) -> Result<()> {
    if self.name.trim().is_empty() {
      bail!("daemon #{} has an empty name", idx + 1);
    }
    let overrides_both = self.start_command.is_some() && self.stop_command.is_some();
    match (&self.exec, &self.eval) {
      (Some(_), Some(_)) => bail!("daemon '{}': exec and eval are mutually exclusive", self.name),
      (None, None) if !overrides_both => bail!(
        "daemon '{}': one of exec or eval is required unless start_command and stop_command are both set",
        self.name
      ),
      _ => {}
    }
    if self.timeout == Some(0) {
      bail!("daemon '{}': timeout must be at least 1 second", self.name);
    }
    if let Some(ping) = &self.ping_command
      && ping.is_empty()
    {
      bail!("daemon '{}': ping_command must not be empty", self.name);
    }
    Ok(())
  }

  fn into_options(self) -> DaemonOptions {
    DaemonOptions {
      command: CommandOptions {
        exec: self.exec,
        eval: self.eval,
        args: self.args,
        name: None,
        user: self.user,
        load_paths: self.load_paths,
      },
      identifier: self.identifier,
      log_file: self.log_file,
      pid_file: self.pid_file,
      timeout: self.timeout.map(Duration::from_secs),
      start_command: self.start_command,
      stop_command: self.stop_command,
      ping: self.ping_command.map(Ping::command),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct HerdConfig {
  /// Directory for pid and output files. Defaults to the system temp dir.
  #[serde(default)]
  pub temp_dir: Option<PathBuf>,
  /// Entry-point token prefixed to generated commands.
  #[serde(default)]
  pub runner: Option<String>,
  #[serde(default)]
  pub quiet: bool,
  /// Declarations in start order.
  #[serde(default, rename = "daemon")]
  pub daemons: Vec<DaemonDecl>,
}

impl HerdConfig {
  /// Parse TOML text; `origin` names the source in warnings and errors.
  ///
  /// # Errors
  /// Returns an error if the text is not valid TOML or does not match the schema.
  pub fn from_toml(text: &str, origin: &Path) -> Result<Self> {
    let val: TomlValue =
      toml::from_str(text).with_context(|| format!("invalid TOML in {}", origin.display()))?;
    warn_unknown_keys(&val, origin);
    let cfg: HerdConfig = val
      .try_into()
      .with_context(|| format!("failed to parse {}", origin.display()))?;
    Ok(cfg)
  }

  /// Check every declaration before anything is registered.
  ///
  /// # Errors
  /// Returns the first invalid declaration.
  pub fn validate(&self) -> Result<()> {
    for (idx, decl) in self.daemons.iter().enumerate() {
      decl.validate(idx)?;
    }
    Ok(())
  }

  /// Validate, then declare every daemon in file order on a fresh herder.
  ///
  /// # Errors
  /// Validation failures, or build/resolution failures from `declare`.
  pub fn into_herder(self, host: HostEnv) -> Result<Herder> {
    self.validate()?;
    let temp_dir = self.temp_dir.unwrap_or_else(std::env::temp_dir);
    let temp_dir = host.absolute(&temp_dir);
    let mut herder = Herder::new(temp_dir, host)
      .with_runner(self.runner.unwrap_or_else(|| DEFAULT_RUNNER.to_string()))
      .with_quiet(self.quiet);
    for decl in self.daemons {
      let name = decl.name.clone();
      herder
        .declare(&name, decl.into_options())
        .with_context(|| format!("failed to declare daemon '{name}'"))?;
    }
    Ok(herder)
  }
}

/// Resolve the herd file path.
///
/// Precedence:
/// 1) explicit path
/// 2) `HERDER_CONFIG` environment variable
/// 3) `./herd.toml` when present
/// 4) `$XDG_CONFIG_HOME/herder/herd.toml` when present
///
/// # Errors
/// Returns an error when no candidate exists.
pub fn locate_config(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
  if let Some(path) = explicit {
    return Ok(cwd.join(path));
  }
  if let Ok(env_path) = std::env::var("HERDER_CONFIG")
    && !env_path.is_empty()
  {
    return Ok(cwd.join(env_path));
  }
  let local = cwd.join(CONFIG_FILE_NAME);
  if local.exists() {
    return Ok(local);
  }
  let xdg = xdg::BaseDirectories::with_prefix("herder");
  if let Some(global) = xdg.find_config_file(CONFIG_FILE_NAME) {
    return Ok(global);
  }
  bail!(
    "no {CONFIG_FILE_NAME} found in {} or the XDG config home; pass --config",
    cwd.display()
  )
}

/// Read and parse the herd file at `path`.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<HerdConfig> {
  let data =
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
  HerdConfig::from_toml(&data, path)
}

/// Warn about unknown keys in a parsed herd file to help catch typos.
fn warn_unknown_keys(val: &TomlValue, file_path: &Path) {
  let TomlValue::Table(table) = val else {
    return;
  };

  for key in table.keys() {
    if !KNOWN_TOP_LEVEL_KEYS.contains(&key.as_str()) {
      eprintln!(
        "{}: unknown config key '{}' in {} (did you mean one of: {}?)",
        "warning".yellow(),
        key,
        file_path.display(),
        KNOWN_TOP_LEVEL_KEYS.join(", ")
      );
    }
  }

  if let Some(TomlValue::Array(daemons)) = table.get("daemon") {
    for (idx, entry) in daemons.iter().enumerate() {
      let TomlValue::Table(daemon) = entry else {
        continue;
      };
      for key in daemon.keys() {
        if !KNOWN_DAEMON_KEYS.contains(&key.as_str()) {
          eprintln!(
            "{}: unknown config key 'daemon[{}].{}' in {} (known keys: {})",
            "warning".yellow(),
            idx,
            key,
            file_path.display(),
            KNOWN_DAEMON_KEYS.join(", ")
          );
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use temp_env::with_vars;

  fn parse(text: &str) -> Result<HerdConfig> {
    HerdConfig::from_toml(text, Path::new("herd.toml"))
  }

  #[test]
  fn parses_full_record() {
    let cfg = parse(
      r#"
temp_dir = "/tmp/herd"
runner = "bin/daemon_runner"
quiet = true

[[daemon]]
name = "db"
exec = "bin/db --fast"
args = ["-a"]
user = "nobody"
load_paths = ["lib"]
identifier = "database"
log_file = "/tmp/db.log"
pid_file = "/tmp/db.pid"
timeout = 10
ping_command = ["pg_isready"]
"#,
    )
    .unwrap();
    assert_eq!(cfg.temp_dir, Some(PathBuf::from("/tmp/herd")));
    assert_eq!(cfg.runner.as_deref(), Some("bin/daemon_runner"));
    assert!(cfg.quiet);
    let db = &cfg.daemons[0];
    assert_eq!(db.name, "db");
    assert_eq!(db.exec.as_deref(), Some("bin/db --fast"));
    assert_eq!(db.args, Some(vec!["-a".to_string()]));
    assert_eq!(db.timeout, Some(10));
    assert_eq!(db.ping_command, Some(vec!["pg_isready".to_string()]));
    cfg.validate().unwrap();
  }

  #[test]
  fn template_parses_to_empty_herd() {
    let cfg = parse(HERD_TEMPLATE).unwrap();
    assert_eq!(cfg, HerdConfig::default());
  }

  #[test]
  fn minimal_record_defaults() {
    let cfg = parse("[[daemon]]\nname = \"w\"\nexec = \"w\"\n").unwrap();
    assert!(cfg.temp_dir.is_none());
    assert!(!cfg.quiet);
    let w = &cfg.daemons[0];
    assert!(w.args.is_none());
    assert!(w.load_paths.is_empty());
    assert!(w.timeout.is_none());
  }

  #[test]
  fn keeps_file_order() {
    let cfg = parse(
      "[[daemon]]\nname = \"c\"\nexec = \"c\"\n[[daemon]]\nname = \"a\"\nexec = \"a\"\n[[daemon]]\nname = \"b\"\nexec = \"b\"\n",
    )
    .unwrap();
    let names: Vec<&str> = cfg.daemons.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["c", "a", "b"]);
  }

  #[test]
  fn invalid_toml_is_reported() {
    let err = parse("[[daemon]\nname = ").unwrap_err();
    assert!(err.to_string().contains("invalid TOML"), "{err}");
  }

  #[test]
  fn missing_name_fails_to_parse() {
    let err = parse("[[daemon]]\nexec = \"x\"\n").unwrap_err();
    assert!(err.to_string().contains("failed to parse"), "{err}");
  }

  #[test]
  fn validation_rejects_bad_records() {
    let both = parse("[[daemon]]\nname = \"x\"\nexec = \"a\"\neval = \"b\"\n").unwrap();
    assert!(both.validate().unwrap_err().to_string().contains("mutually exclusive"));

    let neither = parse("[[daemon]]\nname = \"x\"\n").unwrap();
    assert!(neither.validate().unwrap_err().to_string().contains("one of exec or eval"));

    let zero = parse("[[daemon]]\nname = \"x\"\nexec = \"a\"\ntimeout = 0\n").unwrap();
    assert!(zero.validate().unwrap_err().to_string().contains("timeout"));

    let blank = parse("[[daemon]]\nname = \" \"\nexec = \"a\"\n").unwrap();
    assert!(blank.validate().unwrap_err().to_string().contains("empty name"));
  }

  #[test]
  fn overridden_commands_need_no_strategy() {
    let cfg = parse(
      "[[daemon]]\nname = \"x\"\nstart_command = \"svc start\"\nstop_command = \"svc stop\"\n",
    )
    .unwrap();
    cfg.validate().unwrap();
    let herder = cfg
      .into_herder(HostEnv::new("/", None, false))
      .unwrap();
    assert_eq!(herder.supervisors()[0].start_command, "svc start");
  }

  #[test]
  fn invalid_record_registers_nothing() {
    let cfg = parse(
      "[[daemon]]\nname = \"ok\"\nstart_command = \"a\"\nstop_command = \"b\"\n[[daemon]]\nname = \"bad\"\n",
    )
    .unwrap();
    let err = cfg.into_herder(HostEnv::new("/", None, false)).unwrap_err();
    assert!(err.to_string().contains("'bad'"), "{err}");
  }

  #[test]
  fn into_herder_applies_top_level_settings() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = parse(
      "temp_dir = \"run\"\nrunner = \"my_runner\"\n[[daemon]]\nname = \"x\"\nstart_command = \"a\"\nstop_command = \"b\"\ntimeout = 9\n",
    )
    .unwrap();
    let herder = cfg
      .into_herder(HostEnv::new(dir.path(), None, false))
      .unwrap();
    assert_eq!(herder.temp_dir(), dir.path().join("run"));
    assert_eq!(herder.runner(), "my_runner");
    let sup = &herder.supervisors()[0];
    assert_eq!(sup.pid_file, dir.path().join("run").join("x.pid"));
    assert_eq!(sup.timeout, Duration::from_secs(9));
  }

  #[test]
  fn locate_prefers_explicit_then_env_then_local() {
    let dir = tempfile::tempdir().unwrap();
    let xdg = tempfile::tempdir().unwrap();
    with_vars(
      [
        ("HERDER_CONFIG", Some("from-env.toml")),
        ("XDG_CONFIG_HOME", Some(xdg.path().to_str().unwrap())),
      ],
      || {
        let explicit = locate_config(Some(Path::new("x.toml")), dir.path()).unwrap();
        assert_eq!(explicit, dir.path().join("x.toml"));
        let from_env = locate_config(None, dir.path()).unwrap();
        assert_eq!(from_env, dir.path().join("from-env.toml"));
      },
    );
  }

  #[test]
  fn locate_falls_back_to_local_then_xdg() {
    let dir = tempfile::tempdir().unwrap();
    let xdg = tempfile::tempdir().unwrap();
    with_vars(
      [
        ("HERDER_CONFIG", None::<&str>),
        ("XDG_CONFIG_HOME", Some(xdg.path().to_str().unwrap())),
      ],
      || {
        assert!(locate_config(None, dir.path()).is_err());

        let global_dir = xdg.path().join("herder");
        fs::create_dir_all(&global_dir).unwrap();
        fs::write(global_dir.join(CONFIG_FILE_NAME), "").unwrap();
        assert_eq!(
          locate_config(None, dir.path()).unwrap(),
          global_dir.join(CONFIG_FILE_NAME)
        );

        fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        assert_eq!(
          locate_config(None, dir.path()).unwrap(),
          dir.path().join(CONFIG_FILE_NAME)
        );
      },
    );
  }
}
