use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use crate::command::HostEnv;
use crate::config::{load_config, locate_config};
use crate::herder::Herder;
use crate::supervisor::CommandSupervisor;

pub mod down;
pub mod init;
pub mod list;
pub mod up;

/// Locate, validate and declare the herd file.
pub(crate) fn load_herder(host: &HostEnv, explicit: Option<&Path>) -> Result<Herder> {
  let path = locate_config(explicit, host.cwd())?;
  debug!("loading herd file {}", path.display());
  let cfg = load_config(&path)?;
  cfg
    .into_herder(host.clone())
    .with_context(|| format!("invalid herd file {}", path.display()))
}

/// Runner commands resolve their work dir from `TMPDIR`; point it at the herd's temp dir.
pub(crate) fn supervisor_for(herder: &Herder) -> CommandSupervisor {
  CommandSupervisor::new().with_env("TMPDIR", herder.temp_dir())
}
