//! probectl — run the probe harness and inspect its results.
//!
//! # Usage
//!
//! ```text
//! probectl init
//! probectl run --config probe.toml
//! probectl report --format json
//! probectl reset
//! probectl mark-unavailable --skills docs/skills.json
//! ```
//!
//! Logs go to stderr; the live progress line and command output go to
//! stdout.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "probectl",
    about = "probegrid — concurrent probe harness for remote data endpoints",
    version,
    propagate_version = true
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where to find the harness configuration and the results file.
#[derive(Args, Debug, Clone)]
pub struct ResultsArgs {
    /// Harness configuration file. Missing means defaults.
    #[arg(short, long, default_value = "probe.toml")]
    pub config: PathBuf,
    /// Results file (overrides [results].path).
    #[arg(short, long)]
    pub results: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every probe in the catalog, resuming from previous results.
    Run(commands::run::RunArgs),
    /// Summarize a results file.
    Report {
        #[command(flatten)]
        target: ResultsArgs,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Put probes that failed after max retries back to pending.
    Reset {
        #[command(flatten)]
        target: ResultsArgs,
    },
    /// Flag failed probes as unavailable in a capability listing.
    MarkUnavailable {
        #[command(flatten)]
        target: ResultsArgs,
        /// Capability listing (JSON array) to update in place.
        #[arg(short, long)]
        skills: PathBuf,
    },
    /// Write a default probe.toml.
    Init {
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Report { target, format } => commands::report::report(&target, &format),
        Commands::Reset { target } => commands::report::reset(&target),
        Commands::MarkUnavailable { target, skills } => {
            commands::report::mark_unavailable(&target, &skills)
        }
        Commands::Init { path } => commands::init::init(&path),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
