pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use efiling_core::config::{AppConfig, LoadOptions, LogFormat};

use crate::commands::files::FilesArgs;
use crate::commands::route::RouteArgs;
use crate::commands::sla::SlaArgs;
use crate::commands::template::TemplateCommand;

#[derive(Debug, Parser)]
#[command(
    name = "efiling",
    about = "E-filing routing operator CLI",
    long_about = "Inspect routing decisions, SLA deadlines and workflow templates, and operate the e-filing database.",
    after_help = "Examples:\n  efiling doctor --json\n  efiling route --sender 2\n  efiling sla --from WAT_AEN --to WAT_XEN\n  efiling template show 1\n  efiling files --scoped --token <token>"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset and verify its contract")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, routing settings, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Resolve the eligible next recipients for a sender and file location")]
    Route(RouteArgs),
    #[command(about = "Look up the SLA hours for a role hand-off")]
    Sla(SlaArgs),
    #[command(subcommand, about = "Inspect workflow templates")]
    Template(TemplateCommand),
    #[command(about = "List case files, optionally scoped to the caller's geography")]
    Files(FilesArgs),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Route(args) => commands::route::run(args),
        Command::Sla(args) => commands::sla::run(args),
        Command::Template(command) => commands::template::run(command),
        Command::Files(args) => commands::files::run(args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON envelope.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
