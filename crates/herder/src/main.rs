use owo_colors::OwoColorize as _;

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
    .format_timestamp_secs()
    .init();

  if let Err(err) = herder::run() {
    anstream::eprintln!("{}", format!("{err:#}").red());
    std::process::exit(herder::error::exit_code_for(&err));
  }
}
