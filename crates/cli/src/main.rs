//! `icecore` — a thin command line front end over `icecore-runtime`: `run`
//! a blueprint to completion, `validate` one without executing it, or
//! `register` a binding into a startup manifest file (§10.5).

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    icecore_runtime::logging::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { blueprint, inputs, max_parallel } => {
            commands::run::run(&blueprint, inputs.as_deref(), max_parallel).await
        }
        Command::Validate { blueprint } => commands::validate::run(&blueprint).await,
        Command::Register { manifest, kind, name, definition } => {
            commands::register::run(&manifest, kind.into(), name, &definition)
        }
    }
}
