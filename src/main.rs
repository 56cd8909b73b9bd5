//! # Corpus Unify CLI (`unify`)
//!
//! The `unify` binary builds and inspects the unified corpus.
//!
//! ## Usage
//!
//! ```bash
//! unify --config ./config/unify.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `unify combine` | Merge all configured sources into the output directory |
//! | `unify sources` | List configured sources and whether their inputs exist |
//! | `unify stats` | Summarize the last combine run |
//! | `unify verify` | Check outputs for dangling references and duplicate ids |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `corpus_unify=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use corpus_unify::{config, pipeline, progress::ProgressMode, sources, stats, verify};

/// Corpus Unify: merge bibliographic corpora into one deduplicated dataset.
#[derive(Parser)]
#[command(
    name = "unify",
    about = "Merge bibliographic corpora into one deduplicated dataset of authors, works, and passages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/unify.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine all configured sources.
    ///
    /// Reads author and work files whole, streams passage files, and writes
    /// authors.json, works.json, chunks.json, stats.json, and COMPLETE.json.
    Combine {
        /// Override the configured output directory.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Progress on stderr. Defaults to `human` on a terminal, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// List configured sources and their input files.
    Sources,

    /// Show statistics for the last combine run.
    Stats,

    /// Verify the output directory.
    Verify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("corpus_unify=info,unify=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Combine { output, progress } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            pipeline::run_combine(&cfg, output, mode).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
        Commands::Verify => {
            verify::run_verify(&cfg).await?;
        }
    }

    Ok(())
}
