use clap::Parser;
use kite_http::{
    config::{Cli, Config},
    runner,
};
use std::{io, process};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = Config::try_from(cli).and_then(|config| {
        let stdin = io::stdin();
        let stdout = io::stdout();

        runner::run(&config, &mut stdin.lock(), &mut stdout.lock(), &mut io::stderr())
    });

    if let Err(err) = result {
        log::debug!("{:?}", err);
        eprintln!("kite-http: {}", err);
        process::exit(1);
    }
}
