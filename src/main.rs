//! Binary entry point for compound.
//!
//! This binary provides the CLI interface over the knowledge engine.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use compound::config::CompoundConfig;
use compound::observability::{self, InitOptions};
use compound::KnowledgeEngine;
use std::path::PathBuf;
use std::process::ExitCode;

/// Compound - turns solved problems into compounding team knowledge.
#[derive(Parser)]
#[command(name = "compound")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "COMPOUND_CONFIG")]
    config: Option<PathBuf>,

    /// Expose Prometheus metrics over HTTP while the command runs.
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Capture one session transcript.
    Capture {
        /// Transcript file: JSON array of events, or text with blank-line
        /// separated events.
        file: PathBuf,

        /// Session identifier (defaults to the file stem).
        #[arg(short, long)]
        session: Option<String>,

        /// Category hint, e.g. `performance`.
        #[arg(long)]
        hint: Option<String>,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Capture every transcript in a directory.
    Ingest {
        /// Directory of transcript files.
        dir: PathBuf,

        /// Maximum sessions processed at once.
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },

    /// Search solution documents.
    Search {
        /// The search query.
        query: String,

        /// Restrict to one category.
        #[arg(long)]
        category: Option<String>,

        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show a solution document.
    Show {
        /// Solution ID.
        id: String,
    },

    /// Show the near-duplicate cluster of a document.
    Cluster {
        /// Solution ID.
        id: String,
    },

    /// List critical patterns.
    Patterns {
        /// Include demoted patterns.
        #[arg(long)]
        all: bool,
    },

    /// Demote a critical pattern.
    Demote {
        /// Pattern ID.
        id: String,
    },

    /// Print the required-reading block for prompt injection.
    Context,

    /// Show store statistics.
    Status,

    /// Show the effective configuration.
    Config,
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match CompoundConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability = match observability::init_from_config(
        &config.observability,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: cli.metrics,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(command: Commands, config: CompoundConfig) -> anyhow::Result<()> {
    if let Commands::Config = command {
        return commands::cmd_config(&config);
    }

    let engine = KnowledgeEngine::from_config(&config)?;
    match command {
        Commands::Capture {
            file,
            session,
            hint,
            json,
        } => commands::cmd_capture(&engine, &file, session, hint, json),
        Commands::Ingest { dir, concurrency } => {
            commands::cmd_ingest(&engine, &dir, concurrency).await
        },
        Commands::Search {
            query,
            category,
            limit,
            json,
        } => commands::cmd_search(&engine, &query, category.as_deref(), limit, json),
        Commands::Show { id } => commands::cmd_show(&engine, &id),
        Commands::Cluster { id } => commands::cmd_cluster(&engine, &id),
        Commands::Patterns { all } => commands::cmd_patterns(&engine, all),
        Commands::Demote { id } => commands::cmd_demote(&engine, &id),
        Commands::Context => commands::cmd_context(&engine),
        Commands::Status => commands::cmd_status(&engine, &config),
        Commands::Config => commands::cmd_config(&config),
    }
}
