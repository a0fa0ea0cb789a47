use std::path::Path;

use anyhow::Result;

use crate::command::HostEnv;
use crate::log_warn;

pub fn run(host: &HostEnv, config: Option<&Path>) -> Result<()> {
  let herder = super::load_herder(host, config)?;
  if herder.daemon_count() == 0 {
    log_warn!("No daemons declared");
    return Ok(());
  }
  herder.start_all(&mut super::supervisor_for(&herder))
}
