//! `disc verify`: capture the disc and read its barcode back.

use anyhow::{Result, anyhow};
use clap::Args;
use permit_disc::config::{MAX_CAPTURE_DPI, MIN_CAPTURE_DPI};
use permit_disc::image::{capture_dpi, load_background, read_barcode};
use permit_disc::{ConsoleConfig, DiscRenderer, RenderTarget, compute_layout};

use crate::cli::common::DiscInput;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub input: DiscInput,
    /// Capture density in dots per inch.
    #[arg(long)]
    pub dpi: Option<u32>,
}

pub async fn handle(args: VerifyArgs, config: &ConsoleConfig) -> Result<()> {
    let (record, style) = args.input.load()?;
    let layout = compute_layout(&record, &style);
    if let Some(reason) = layout.degraded() {
        return Err(anyhow!("no barcode on this disc: {reason}"));
    }
    let slot = layout
        .barcode()
        .ok_or_else(|| anyhow!("layout has no barcode slot"))?;

    let background = match &style.background_image {
        Some(source) => Some(load_background(source, config.capture.timeout()).await?),
        None => None,
    };
    let dpi = args
        .dpi
        .unwrap_or(config.capture.dpi)
        .clamp(MIN_CAPTURE_DPI, MAX_CAPTURE_DPI);
    let surface =
        DiscRenderer::with_background(background).render(&layout, RenderTarget::Capture { dpi })?;
    let raster = surface
        .raster()
        .ok_or_else(|| anyhow!("capture produced no raster"))?;

    let decoded = read_barcode(raster, slot)?;
    if decoded != layout.payload {
        return Err(anyhow!(
            "barcode reads '{decoded}' but the disc should carry '{}'",
            layout.payload
        ));
    }
    println!(
        "Barcode verified at {} dpi: {decoded}",
        capture_dpi(&layout, dpi)
    );
    Ok(())
}
