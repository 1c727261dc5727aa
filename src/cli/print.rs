//! `disc print`: hand the physical-size document to the print command.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Args;
use permit_disc::render::{DryRunPrintHost, PrintHost, render_print_document};
use permit_disc::{ConsoleConfig, ExportCoordinator, ExportTarget, Outcome, compute_layout};

use crate::cli::common::DiscInput;
use crate::cli::utils::write_output;

#[derive(Args, Debug)]
pub struct PrintArgs {
    #[command(flatten)]
    pub input: DiscInput,
    /// Render and validate without contacting the printer.
    #[arg(long)]
    pub dry_run: bool,
    /// Also write the print document to this path (`-` for stdout).
    #[arg(long)]
    pub emit: Option<PathBuf>,
}

pub async fn handle(args: PrintArgs, config: ConsoleConfig) -> Result<()> {
    let (record, style) = args.input.load()?;
    if let Some(path) = &args.emit {
        let (html, _) = render_print_document(&compute_layout(&record, &style))?;
        write_output(path, &html)?;
    }

    let outcome = if args.dry_run {
        ExportCoordinator::with_print_host(config, DryRunPrintHost)
            .run(&record, &style, ExportTarget::Print)
            .await
    } else {
        ExportCoordinator::new(config)
            .run(&record, &style, ExportTarget::Print)
            .await
    };
    report(outcome, args.dry_run.then(|| DryRunPrintHost.name()))
}

fn report(outcome: Outcome, dry_run: Option<String>) -> Result<()> {
    match outcome {
        Outcome::Printed { host, degraded } => {
            match dry_run {
                Some(_) => println!("Dry run complete; nothing was sent to a printer"),
                None => println!("Print job submitted via {host}"),
            }
            if let Some(reason) = degraded {
                eprintln!("warning: barcode replaced by a placeholder: {reason}");
            }
            Ok(())
        }
        Outcome::Failed(err) => Err(anyhow!("print failed: {err}\nhint: {}", err.advice())),
        Outcome::Busy => Err(anyhow!("another export is already in progress")),
        Outcome::Exported { file, .. } => Err(anyhow!(
            "unexpected export to {} during print",
            file.display()
        )),
    }
}
