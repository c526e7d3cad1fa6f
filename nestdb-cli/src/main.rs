// nestdb-cli/src/main.rs
// ============================================================================
// Module: nestdb CLI Entry Point
// Description: Flag parsing, schema/token loading, and the serve loop.
// Purpose: Start an in-memory nestdb server from the command line.
// Dependencies: clap, nestdb-server, serde_json, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! `nestdb -s schema.json` serves a fresh in-memory database tree on port
//! 3318. The schema is compiled once at startup and validates every stored
//! document; an optional token file pre-seeds day-long sessions; `-l`
//! selects the log level (-1 debug, 0 info, 1 errors only).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nestdb_server::AppState;
use nestdb_server::SchemaGate;
use nestdb_server::ServeError;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Command-line flags.
#[derive(Parser, Debug)]
#[command(name = "nestdb", about = "Hierarchical in-memory JSON document database over HTTP")]
struct Cli {
    /// TCP port to listen on.
    #[arg(short = 'p', default_value_t = 3318)]
    port: u16,
    /// JSON Schema file; every stored document must conform to it.
    #[arg(short = 's')]
    schema: PathBuf,
    /// Optional JSON file mapping usernames to startup tokens.
    #[arg(short = 't')]
    tokens: Option<PathBuf>,
    /// Log level: -1 debug, 0 info, 1 errors only.
    #[arg(short = 'l', default_value_t = 0, allow_hyphen_values = true)]
    log_level: i8,
}

/// Startup failures.
#[derive(Debug, Error)]
enum CliError {
    /// The schema file could not be read or compiled.
    #[error("schema error: {0}")]
    Schema(String),
    /// The token file could not be read or parsed.
    #[error("token file error: {0}")]
    Tokens(String),
    /// The server failed to bind or serve.
    #[error(transparent)]
    Serve(#[from] ServeError),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            ExitCode::FAILURE
        }
    }
}

/// Loads startup inputs and serves until the process exits.
async fn run(cli: Cli) -> Result<(), CliError> {
    let schema = load_schema(&cli.schema)?;
    let state = AppState::new(schema);
    if let Some(path) = &cli.tokens {
        state.install_tokens(&load_tokens(path)?);
    }
    nestdb_server::serve(state, cli.port).await?;
    Ok(())
}

// ============================================================================
// SECTION: Startup Loading
// ============================================================================

/// Reads and compiles the document schema.
fn load_schema(path: &PathBuf) -> Result<SchemaGate, CliError> {
    let raw = fs::read(path).map_err(|err| CliError::Schema(err.to_string()))?;
    let schema: Value =
        serde_json::from_slice(&raw).map_err(|err| CliError::Schema(err.to_string()))?;
    SchemaGate::compile(&schema).map_err(|err| CliError::Schema(err.to_string()))
}

/// Reads the optional `username -> token` startup file.
fn load_tokens(path: &PathBuf) -> Result<HashMap<String, String>, CliError> {
    let raw = fs::read(path).map_err(|err| CliError::Tokens(err.to_string()))?;
    serde_json::from_slice(&raw).map_err(|err| CliError::Tokens(err.to_string()))
}

/// Maps the `-l` flag onto a tracing filter.
fn init_logging(level: i8) {
    let max_level = match level {
        level if level <= -1 => tracing::Level::DEBUG,
        level if level >= 1 => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(max_level).init();
}

// ============================================================================
// SECTION: Tests
// ============================================================================
