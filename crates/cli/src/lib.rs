pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "threadmind",
    about = "Threadmind operator CLI",
    long_about = "Inspect configuration, check readiness, apply feedback migrations, and preview agent replies.",
    after_help = "Examples:\n  threadmind doctor --json\n  threadmind config\n  threadmind render transcript.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending feedback database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack token readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Parse an agent transcript file and print the Slack reply it would produce")]
    Render {
        #[arg(help = "Path to a transcript JSON file (`{\"messages\": [...]}` or a bare array)")]
        transcript: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Render { transcript } => commands::render::run(&transcript),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
