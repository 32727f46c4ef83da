//! Nimbus CLI
//!
//! Inspection tools for the Nimbus driver.
//!
//! # Commands
//!
//! - `encode-frame` - Build a request envelope and print it as hex
//! - `decode-frame` - Decode a hex envelope or bare header
//! - `merge` - Merge ORDER BY partition pages from a JSON file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Nimbus driver inspection tools.
#[derive(Parser)]
#[command(name = "nimbus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a request envelope as hex
    EncodeFrame {
        /// Operation type (e.g. Read, Query, ExecuteJavaScript)
        #[arg(short, long)]
        operation: String,

        /// Resource type (e.g. Document, StoredProcedure)
        #[arg(short, long)]
        resource: String,

        /// Activity id (random if omitted)
        #[arg(short, long)]
        activity_id: Option<String>,

        /// Request body
        #[arg(short, long, default_value = "")]
        payload: String,
    },

    /// Decode a hex envelope or 20-byte header
    DecodeFrame {
        /// Hex-encoded bytes
        hex: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Merge server-sorted partition pages
    Merge {
        /// JSON file holding the pages
        #[arg(short, long)]
        input: PathBuf,

        /// Comma-separated sort orders, one per column (asc, desc)
        #[arg(short, long)]
        order: Option<String>,

        /// Keep only the first N rows
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::EncodeFrame {
            operation,
            resource,
            activity_id,
            payload,
        } => {
            commands::frame::run_encode(&operation, &resource, activity_id.as_deref(), &payload)?;
        }
        Commands::DecodeFrame { hex, format } => {
            commands::frame::run_decode(&hex, &format)?;
        }
        Commands::Merge {
            input,
            order,
            limit,
            format,
        } => {
            commands::merge::run(&input, order.as_deref(), limit, &format)?;
        }
        Commands::Version => {
            println!("Nimbus CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Frame header: {} bytes, max message: {} bytes",
                nimbus_codec::FRAME_HEADER_LEN,
                nimbus_codec::MAX_MESSAGE_SIZE
            );
        }
    }

    Ok(())
}
