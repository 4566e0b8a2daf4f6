pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shoplist",
    about = "Shoplist operator CLI",
    long_about = "Check shopping bot readiness, inspect configuration, and load demo data.",
    after_help = "Examples:\n  shoplist doctor --json\n  shoplist config\n  shoplist seed --channel 123456789"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Write the demo groceries list into the configured data directory")]
    Seed {
        #[arg(long, default_value = commands::seed::DEFAULT_CHANNEL, help = "Channel id to seed")]
        channel: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token readiness, and storage access")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Seed { channel } => commands::seed::run(&channel),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
