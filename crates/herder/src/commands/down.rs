use std::path::Path;

use anyhow::Result;

use crate::command::HostEnv;

pub fn run(host: &HostEnv, config: Option<&Path>) -> Result<()> {
  let herder = super::load_herder(host, config)?;
  herder.stop_all(&mut super::supervisor_for(&herder))
}
