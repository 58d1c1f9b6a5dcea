//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::error::Error;

use areasmith_cli::CliError;
use log::error;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = areasmith_cli::run() {
        if let CliError::ArgumentParsing(clap_err) = &err {
            clap_err.exit();
        }
        let mut message = err.to_string();
        let mut cause = err.source();
        while let Some(next) = cause {
            message.push_str(": ");
            message.push_str(&next.to_string());
            cause = next.source();
        }
        error!("areasmith: {message}");
        std::process::exit(err.exit_code());
    }
}
