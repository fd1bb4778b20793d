//! UGDB CLI
//!
//! Command-line tools for UGDB corpus directories.
//!
//! # Commands
//!
//! - `create` - Create an empty corpus
//! - `stat` - Display environment statistics
//! - `get` - Print the value stored at a key
//! - `counter` - Print the counter stored at a key
//! - `put-counter` - Insert a counter
//! - `exists` - Report whether a key has a value

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// UGDB command-line corpus tools.
#[derive(Parser)]
#[command(name = "ugdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the corpus directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Use keys as raw bytes instead of NUL-terminated strings
    #[arg(global = true, short, long)]
    raw: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty corpus at --path
    Create,

    /// Display environment statistics
    Stat {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the value stored at a key
    Get {
        /// Key to look up
        key: String,
    },

    /// Print the counter stored at a key (0 if absent)
    Counter {
        /// Key to look up
        key: String,
    },

    /// Insert a counter; fails if the key already has a value
    PutCounter {
        /// Key to write
        key: String,
        /// Count to store
        value: u64,
    },

    /// Report whether a key has a value
    Exists {
        /// Key to look up
        key: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("UGDB CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let path = cli.path.ok_or("Corpus path required (--path)")?;
    match cli.command {
        Commands::Create => commands::create::run(&path)?,
        Commands::Stat { format } => commands::stat::run(&path, &format)?,
        Commands::Get { key } => commands::read::get(&path, &key, cli.raw)?,
        Commands::Counter { key } => commands::read::counter(&path, &key, cli.raw)?,
        Commands::Exists { key } => commands::read::exists(&path, &key, cli.raw)?,
        Commands::PutCounter { key, value } => {
            commands::write::put_counter(&path, &key, value, cli.raw)?;
        }
        Commands::Version => {}
    }

    Ok(())
}
