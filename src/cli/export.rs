//! `disc export`: write the print-ready PDF.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use permit_disc::{ConsoleConfig, ExportCoordinator, ExportTarget, Outcome};

use crate::cli::common::DiscInput;

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: DiscInput,
    /// Directory receiving `Taxi_Permit_<registration>.pdf`.
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Capture density in dots per inch.
    #[arg(long)]
    pub dpi: Option<u32>,
    /// Refuse to export a disc whose barcode could not be encoded.
    #[arg(long)]
    pub require_barcode: bool,
}

pub async fn handle(args: ExportArgs, mut config: ConsoleConfig) -> Result<()> {
    let (record, style) = args.input.load()?;
    if let Some(dir) = args.output_dir {
        config.export.output_dir = dir;
    }
    if let Some(dpi) = args.dpi {
        config.capture.dpi = dpi;
    }
    config.export.require_barcode |= args.require_barcode;
    std::fs::create_dir_all(&config.export.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.export.output_dir.display()
        )
    })?;

    match ExportCoordinator::new(config)
        .run(&record, &style, ExportTarget::Pdf)
        .await
    {
        Outcome::Exported {
            file,
            placed_diameter_mm,
            degraded,
        } => {
            println!(
                "Exported {} (disc {placed_diameter_mm:.1} mm)",
                file.display()
            );
            if let Some(reason) = degraded {
                eprintln!("warning: barcode replaced by a placeholder: {reason}");
            }
            Ok(())
        }
        Outcome::Failed(err) => Err(anyhow!(
            "export failed during {}: {err}\nhint: {}",
            err.stage(),
            err.advice()
        )),
        Outcome::Busy => Err(anyhow!("another export is already in progress")),
        Outcome::Printed { .. } => Err(anyhow!("unexpected print outcome during export")),
    }
}
