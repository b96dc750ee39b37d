pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "smartcrop",
    about = "SmartCrop operator CLI",
    long_about = "Operate the SmartCrop advisory backend: migrations, demo data, readiness \
                  checks, config inspection and offline recommendations.",
    after_help = "Examples:\n  smartcrop doctor --json\n  smartcrop seed\n  \
                  smartcrop recommend --district Ludhiana --nitrogen 25 --phosphorus 18 \
                  --potassium 220 --ph 7.2"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and report how many ran")]
    Migrate,
    #[command(about = "Load the demo farmers and recommendations, then verify them")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Check config, database, schema, soil table, model and channel readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run the decision engine offline for one soil sample")]
    Recommend(RecommendArgs),
}

#[derive(Debug, Args)]
pub struct RecommendArgs {
    #[arg(long)]
    pub district: String,
    #[arg(long)]
    pub nitrogen: f64,
    #[arg(long)]
    pub phosphorus: f64,
    #[arg(long)]
    pub potassium: f64,
    #[arg(long)]
    pub ph: f64,
    #[arg(long)]
    pub last_crop: Option<String>,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Recommend(args) => commands::recommend::run(&args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
