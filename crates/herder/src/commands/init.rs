use std::fs;

use anyhow::{Context, Result, bail};

use crate::command::HostEnv;
use crate::config::{CONFIG_FILE_NAME, HERD_TEMPLATE};
use crate::log_info;
use crate::utils::log::t;

pub fn run(host: &HostEnv) -> Result<()> {
  let path = host.cwd().join(CONFIG_FILE_NAME);
  if path.exists() {
    bail!("{} already exists", path.display());
  }
  fs::write(&path, HERD_TEMPLATE).with_context(|| format!("failed to write {}", path.display()))?;
  log_info!("Created {}", t::path(path.display()));
  Ok(())
}
