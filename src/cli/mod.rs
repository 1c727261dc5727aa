//! Command-line interface wiring for the `disc` binary.
//!
//! This module owns the clap definitions and delegates execution to one
//! submodule per command.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use permit_disc::ConsoleConfig;

pub mod barcode;
pub mod common;
pub mod export;
pub mod layout;
pub mod preview;
pub mod print;
pub mod utils;
pub mod verify;

/// Parsed CLI entrypoint for the `disc` binary.
#[derive(Parser, Debug)]
#[command(
    name = "disc",
    version,
    about = "Permit disc preview, print and PDF export"
)]
pub struct Cli {
    /// TOML configuration file (capture, preview, print, export sections).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log layout decisions and stage transitions.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the interactive preview as SVG.
    Preview(preview::PreviewArgs),
    /// Send the disc to the configured print command.
    Print(print::PrintArgs),
    /// Export a print-ready A4 PDF.
    Export(export::ExportArgs),
    /// Dump the resolved layout as JSON.
    Layout(layout::LayoutArgs),
    /// Inspect the barcode a payload would produce.
    Barcode(barcode::BarcodeArgs),
    /// Capture the disc and read the barcode back from the raster.
    Verify(verify::VerifyArgs),
}

/// Execute the requested command.
pub async fn run(cli: Cli) -> Result<()> {
    let config = ConsoleConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Preview(args) => preview::handle(args, &config),
        Command::Print(args) => print::handle(args, config).await,
        Command::Export(args) => export::handle(args, config).await,
        Command::Layout(args) => layout::handle(args),
        Command::Barcode(args) => barcode::handle(args),
        Command::Verify(args) => verify::handle(args, &config).await,
    }
}
