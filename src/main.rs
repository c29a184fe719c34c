//! Stashdb CLI - inspect and edit a local keyed object store

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "stashdb")]
#[command(version)]
#[command(about = "Local keyed object store for JSON records")]
#[command(long_about = r#"
Stashdb keeps named stores of JSON records keyed by id, enabling:
  • Quick edits from the shell (put, get, update, delete)
  • Per-store statistics
  • An HTTP API with live change notifications

Example usage:
  stashdb init
  stashdb put posts 1 '{"title": "Hello"}'
  stashdb update posts 1 '{"title": "Hello again"}'
  stashdb serve --port 4780
"#)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print errors and warnings
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the database
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Insert or replace a record
    Put {
        store: String,
        id: String,
        /// Record body as a JSON object
        value: String,
    },

    /// Show one record
    Get { store: String, id: String },

    /// Show every record in a store
    List { store: String },

    /// Merge fields into an existing record
    Update {
        store: String,
        id: String,
        /// Fields to merge, as a JSON object
        patch: String,
    },

    /// Remove a record
    Delete { store: String, id: String },

    /// Show record counts per store
    Stats,

    /// Serve the HTTP API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory served for paths outside the API
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Print the version
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(&self) -> bool {
        *self == OutputMode::Human
    }
}

/// Print a command result in the JSON envelope
pub fn emit_success(
    output_mode: OutputMode,
    command: &str,
    data: serde_json::Value,
) -> anyhow::Result<()> {
    if output_mode.is_human() {
        return Ok(());
    }
    let envelope = serde_json::json!({
        "ok": true,
        "command": command,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("stashdb=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    stashdb::output::set_quiet(cli.quiet);

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let paths = commands::Paths {
        config: cli.config,
        database: cli.database,
    };

    let result = match cli.command {
        Commands::Init { force } => commands::run_init(&paths, force, output_mode).await,
        Commands::Put { store, id, value } => {
            commands::run_put(&paths, &store, &id, &value, output_mode).await
        }
        Commands::Get { store, id } => commands::run_get(&paths, &store, &id, output_mode).await,
        Commands::List { store } => commands::run_list(&paths, &store, output_mode).await,
        Commands::Update { store, id, patch } => {
            commands::run_update(&paths, &store, &id, &patch, output_mode).await
        }
        Commands::Delete { store, id } => {
            commands::run_delete(&paths, &store, &id, output_mode).await
        }
        Commands::Stats => commands::run_stats(&paths, output_mode).await,
        Commands::Serve { port, static_dir } => commands::run_serve(&paths, port, static_dir).await,
        Commands::Version => commands::run_version(output_mode),
    };

    if let Err(err) = result {
        if output_mode.is_human() {
            stashdb::ui::error(&format!("{:#}", err));
        } else {
            let envelope = serde_json::json!({ "ok": false, "error": format!("{:#}", err) });
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        std::process::exit(1);
    }
    Ok(())
}
