#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod app;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::app::{
    options::{get_command, Options},
    runtime::Config,
};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = get_command().get_matches();
    let result = Options::from_args(&args)
        .and_then(Config::new)
        .and_then(|config| config.run());

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(why) => {
            eprintln!("{why}");
            ExitCode::FAILURE
        }
    }
}
