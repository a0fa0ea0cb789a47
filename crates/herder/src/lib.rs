use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

pub mod command;
mod commands;
pub mod config;
pub mod error;
pub mod herder;
pub mod privilege;
pub mod runner;
pub mod supervisor;
pub mod utils;

use crate::command::{CommandSpec, HostEnv};
use crate::runner::SpawnRunner;

/// Herder - declare, launch and tear down groups of background daemons.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Debug, Args)]
struct ConfigArgs {
  /// Herd file to load (defaults: $HERDER_CONFIG, ./herd.toml, $XDG_CONFIG_HOME/herder/herd.toml)
  #[arg(short, long, value_name = "PATH")]
  config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
  /// Write a commented herd.toml template to the current directory
  Init,
  /// Start every declared daemon in order
  Up {
    #[command(flatten)]
    config: ConfigArgs,
  },
  /// Stop every declared daemon in reverse order
  Down {
    #[command(flatten)]
    config: ConfigArgs,
  },
  /// Show declared daemons with their pid and log files
  List {
    #[command(flatten)]
    config: ConfigArgs,
  },
}

pub fn parse() -> Cli {
  Cli::parse()
}

/// Entry point of the `herder` binary.
///
/// # Errors
/// Config, declaration and supervisor failures.
pub fn run() -> Result<()> {
  let cli = parse();
  let host = HostEnv::from_process()?;

  match cli.command {
    Commands::Init => commands::init::run(&host),
    Commands::Up { config } => commands::up::run(&host, config.config.as_deref()),
    Commands::Down { config } => commands::down::run(&host, config.config.as_deref()),
    Commands::List { config } => commands::list::run(&host, config.config.as_deref()),
  }
}

/// Entry point of the `daemon_runner` binary: parse `argv` and launch it.
///
/// # Errors
/// Usage, validation, resolution, privilege and environment failures, or the
/// runner's own failure.
pub fn run_daemon_runner<I, S>(argv: I) -> Result<()>
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
  let spec = CommandSpec::from_args(&argv)?;
  runner::launch(&spec, &mut SpawnRunner::default())
}
