//! `disc preview`: write the interactive preview as SVG.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use permit_disc::{ConsoleConfig, DiscRenderer, RenderTarget, compute_layout};

use crate::cli::common::DiscInput;
use crate::cli::utils::write_output;

#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: DiscInput,
    /// Output file (`-` for stdout).
    #[arg(short = 'o', long = "output", default_value = "-")]
    pub output: PathBuf,
    /// Container edge in CSS px; defaults to the configured preview size.
    #[arg(long)]
    pub width: Option<f64>,
}

pub fn handle(args: PreviewArgs, config: &ConsoleConfig) -> Result<()> {
    let (record, style) = args.input.load()?;
    let container_px = args.width.unwrap_or(config.preview.container_px);
    if !(container_px.is_finite() && container_px > 0.0) {
        anyhow::bail!("preview width must be positive (got {container_px})");
    }
    let layout = compute_layout(&record, &style);
    let surface = DiscRenderer::new()
        .render(&layout, RenderTarget::Preview { container_px })
        .context("failed to render preview")?;
    write_output(&args.output, surface.markup().unwrap_or_default())?;
    if args.output.as_os_str() != "-" {
        println!(
            "Preview of {} written to {} ({container_px:.1} px)",
            record.registration_number,
            args.output.display()
        );
    }
    if let Some(reason) = layout.degraded() {
        eprintln!("warning: barcode replaced by a placeholder: {reason}");
    }
    Ok(())
}
