//! livedoc CLI - live browser preview for documents.
//!
//! Provides commands for:
//! - `preview`: Keep browser previews of documents up to date while they are edited
//! - `export`: Export a document to a standalone HTML page once

mod commands;
mod error;
mod output;
mod protocol;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ExportArgs, PreviewArgs};
use output::Output;

/// livedoc - live browser preview for documents.
#[derive(Parser)]
#[command(name = "livedoc", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview documents in a browser, reloading on every save.
    Preview(PreviewArgs),
    /// Export a document to HTML without starting any server.
    Export(ExportArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Preview(args) if args.verbose);

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Preview(args) => {
            let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
            rt.block_on(args.execute())
        }
        Commands::Export(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
