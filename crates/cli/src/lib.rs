pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "threadcast",
    about = "Threadcast operator CLI",
    long_about = "Inspect threadcast configuration, run readiness checks, and preview image uploads.",
    after_help = "Examples:\n  threadcast doctor --json\n  threadcast config\n  threadcast images --dir static/images"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack token readiness, and images directory checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the images /generate would upload")]
    Images {
        #[arg(long, help = "Images directory to inspect instead of the configured one")]
        dir: Option<PathBuf>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Images { dir, json } => commands::images::run(dir, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
