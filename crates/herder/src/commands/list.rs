use std::path::Path;

use anyhow::Result;

use crate::command::HostEnv;
use crate::herder::Herder;
use crate::utils::pidfile::read_pid;
use crate::utils::term::print_table;

const HEADERS: [&str; 4] = ["DAEMON", "STATE", "PID", "LOG"];

pub fn run(host: &HostEnv, config: Option<&Path>) -> Result<()> {
  let herder = super::load_herder(host, config)?;
  print_table(&HEADERS, &rows(&herder));
  Ok(())
}

fn rows(herder: &Herder) -> Vec<Vec<String>> {
  herder
    .supervisors()
    .iter()
    .map(|cfg| {
      let state = if cfg.is_running() { "running" } else { "stopped" };
      let pid = match read_pid(&cfg.pid_file) {
        Ok(Some(pid)) => pid.to_string(),
        Ok(None) => "-".to_string(),
        Err(_) => "?".to_string(),
      };
      vec![
        cfg.identifier.clone(),
        state.to_string(),
        pid,
        cfg.log_file.display().to_string(),
      ]
    })
    .collect()
}
