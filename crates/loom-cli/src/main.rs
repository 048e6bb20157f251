//! `loom`: command-line entry point (§6). Dispatches to `run`/`export`/
//! `status` per the parsed subcommand; exit code follows `main`'s `Result`
//! return (0 on success, 1 with the error printed to stderr otherwise).

use anyhow::Result;
use clap::Parser;

use loom_cli::cli::{Cli, Command};
use loom_cli::commands;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { manifest, parallel, step, column } => {
            commands::run::execute(&cli.db, &manifest, parallel, step, column).await
        }
        Command::Export(args) => commands::export::execute(&cli.db, &args),
        Command::Status => commands::status::execute(&cli.db),
    }
}
