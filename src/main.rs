mod cli;
mod gpio;

use clap::Parser;

use cli::Cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = cli::run(cli) {
        eprintln!("wavehat: {e}");
        std::process::exit(1);
    }
}
