use owo_colors::OwoColorize as _;

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .format_timestamp_secs()
    .init();

  if let Err(err) = herder::run_daemon_runner(std::env::args().skip(1)) {
    anstream::eprintln!("{}", format!("{err:#}").red());
    std::process::exit(herder::error::exit_code_for(&err));
  }
}
