pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "gaffer",
    about = "Gaffer operator CLI",
    long_about = "Operate gaffer runtime readiness, config inspection, and command registration.",
    after_help = "Examples:\n  gaffer doctor --json\n  gaffer config\n  gaffer register"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate config, registry readiness, and credential presence")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Print the slash-command registration payloads as JSON")]
    Register,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Register => {
            commands::CommandResult { exit_code: 0, output: commands::register::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
