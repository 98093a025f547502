mod commands;

use crate::commands::{handle_connectors, handle_explain, handle_run, ExplainArgs, RunArgs};
use clap::{Parser, Subcommand};
use common::error::TunnelError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "datatunnel")]
pub struct Cli {
    #[arg(
        long = "config-path",
        short = 'c',
        help = "path to the settings file",
        global = true
    )]
    pub config_path: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Execute a transfer statement
    Run(RunArgs),
    /// Resolve a statement and print its plan without executing it
    Explain(ExplainArgs),
    /// List registered connectors and their capabilities
    Connectors,
}

fn run_cmd(func: Result<(), TunnelError>) {
    if let Err(e) = func {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn main() {
    logging::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Cmd::Run(args) => run_cmd(handle_run(args, cli.config_path.clone())),
        Cmd::Explain(args) => run_cmd(handle_explain(args, cli.config_path.clone())),
        Cmd::Connectors => run_cmd(handle_connectors()),
    }
}
