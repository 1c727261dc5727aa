//! `disc layout`: dump the resolved layout for inspection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use permit_disc::compute_layout;

use crate::cli::common::DiscInput;
use crate::cli::utils::write_output;

#[derive(Args, Debug)]
pub struct LayoutArgs {
    #[command(flatten)]
    pub input: DiscInput,
    /// Output file (`-` for stdout).
    #[arg(short = 'o', long = "output", default_value = "-")]
    pub output: PathBuf,
    /// Fail when any element escapes its reserved band.
    #[arg(long)]
    pub validate: bool,
}

pub fn handle(args: LayoutArgs) -> Result<()> {
    let (record, style) = args.input.load()?;
    let layout = compute_layout(&record, &style);
    if args.validate {
        layout.validate().context("layout failed validation")?;
    }
    let json = serde_json::to_string_pretty(&layout)?;
    write_output(&args.output, &format!("{json}\n"))
}
