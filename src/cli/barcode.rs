//! `disc barcode`: show what a payload encodes to.

use anyhow::{Context, Result};
use clap::Args;
use permit_disc::core::barcode::MIN_MODULE_MM;
use permit_disc::{Code128, Symbology, normalize_payload};

#[derive(Args, Debug)]
pub struct BarcodeArgs {
    /// Registration number or identifier, as typed.
    pub payload: String,
    /// Print the module pattern with `#` for bars.
    #[arg(long)]
    pub bars: bool,
}

pub fn handle(args: BarcodeArgs) -> Result<()> {
    let symbology = Code128::new();
    let payload = normalize_payload(&args.payload);
    let bitmap = symbology
        .encode(&payload)
        .with_context(|| format!("cannot encode '{}'", args.payload))?;
    println!("Symbology:     {}", symbology.name());
    println!("Payload:       {}", bitmap.payload());
    println!("Modules:       {} (quiet zones included)", bitmap.module_count());
    println!(
        "Minimum width: {:.2} mm at {MIN_MODULE_MM} mm per module",
        bitmap.min_width_mm()
    );
    if args.bars {
        let pattern: String = bitmap
            .modules()
            .iter()
            .map(|dark| if *dark { '#' } else { ' ' })
            .collect();
        for _ in 0..3 {
            println!("|{pattern}|");
        }
    }
    Ok(())
}
