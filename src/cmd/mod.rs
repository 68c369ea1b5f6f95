//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`] or [`health`]. Each handler lives in its
//! own submodule.

pub mod health;
pub mod run;

use crate::cli::{Cli, Commands};
use crate::error::HttpChainError;

pub async fn dispatch(cli: Cli) -> Result<(), HttpChainError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  httpchain v{version} \u{2014} HTTP service chain demo server\n\n  \
         No command provided. To get started:\n\n    \
         httpchain run                     Start the server on :8080\n    \
         httpchain health                  Probe a running instance\n    \
         httpchain --help                  See all commands and options\n"
    );
}
