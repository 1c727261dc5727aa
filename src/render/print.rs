//! Print target: an A4 HTML document with the disc at its physical size,
//! and the hosts that hand it to the operating system's print facility.

use std::fmt::Write as _;
use std::future::Future;
use std::process::Stdio;

use log::{debug, info};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::PrintConfig;
use crate::core::layout::{DISC_DIAMETER_MM, DiscLayout};
use crate::error::RenderError;
use crate::render::svg::write_disc_svg;
use crate::render::{ElementPlacement, escape_xml};

/// Build the print document. Layout units are millimetres, so the disc is
/// exactly [`DISC_DIAMETER_MM`] wide on paper at 100% scale.
pub fn render_print_document(
    layout: &DiscLayout,
) -> Result<(String, Vec<ElementPlacement>), RenderError> {
    let mut out = String::new();
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, r#"<html lang="en"><head><meta charset="utf-8">"#)?;
    writeln!(
        out,
        "<title>Permit disc {}</title>",
        escape_xml(&layout.payload)
    )?;
    writeln!(out, "<style>")?;
    writeln!(out, "@page {{ size: A4 portrait; margin: 0; }}")?;
    writeln!(out, "html, body {{ margin: 0; padding: 0; background: #ffffff; }}")?;
    writeln!(
        out,
        ".sheet {{ width: 210mm; height: 297mm; display: flex; align-items: center; justify-content: center; }}"
    )?;
    writeln!(
        out,
        ".disc svg {{ display: block; width: {0}mm; height: {0}mm; -webkit-print-color-adjust: exact; print-color-adjust: exact; }}",
        DISC_DIAMETER_MM
    )?;
    writeln!(out, "</style></head><body>")?;
    writeln!(out, r#"<main class="sheet"><div class="disc">"#)?;
    let placements = write_disc_svg(
        &mut out,
        layout,
        DISC_DIAMETER_MM,
        &format!("{DISC_DIAMETER_MM}mm"),
    )?;
    writeln!(out, "</div></main>")?;
    writeln!(out, "</body></html>")?;
    Ok((out, placements))
}

/// Host facility that prints a rendered document.
pub trait PrintHost {
    fn name(&self) -> String;
    fn submit(&self, document: &str) -> impl Future<Output = Result<(), RenderError>> + Send;
}

/// Pipes the document into an external command such as `lp` or `lpr`.
#[derive(Debug, Clone)]
pub struct CommandPrintHost {
    command: String,
    args: Vec<String>,
}

impl CommandPrintHost {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &PrintConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

impl PrintHost for CommandPrintHost {
    fn name(&self) -> String {
        self.command.clone()
    }

    async fn submit(&self, document: &str) -> Result<(), RenderError> {
        debug!("spawning {} {:?}", self.command, self.args);
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|source| RenderError::Launch {
                command: self.command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(document.as_bytes())
                .await
                .map_err(|source| RenderError::Pipe {
                    command: self.command.clone(),
                    source,
                })?;
        }

        let status = child.wait().await.map_err(|source| RenderError::Launch {
            command: self.command.clone(),
            source,
        })?;
        if !status.success() {
            return Err(RenderError::Rejected {
                command: self.command.clone(),
                status: status.to_string(),
            });
        }
        info!("print job accepted by {}", self.command);
        Ok(())
    }
}

/// Accepts every job without printing; used by `disc print --dry-run`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunPrintHost;

impl PrintHost for DryRunPrintHost {
    fn name(&self) -> String {
        "dry-run".to_string()
    }

    async fn submit(&self, document: &str) -> Result<(), RenderError> {
        info!("dry run: {} bytes of print markup not sent", document.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::compute_layout;
    use crate::core::permit::{DiscStyle, PermitRecord};

    #[test]
    fn print_document_uses_physical_units() {
        let record = PermitRecord {
            registration_number: "ND 123-456".into(),
            ..Default::default()
        };
        let layout = compute_layout(&record, &DiscStyle::default());
        let (html, placements) = render_print_document(&layout).unwrap();
        assert!(html.contains("@page { size: A4 portrait"));
        assert!(html.contains(r#"width="90mm""#));
        assert!(html.contains(r#"viewBox="0 0 90.000 90.000""#));
        assert!(placements.iter().all(|p| p.diameter == DISC_DIAMETER_MM));
    }

    #[tokio::test]
    async fn missing_print_command_is_a_launch_error() {
        let host = CommandPrintHost::new("definitely-not-a-printer-command", Vec::new());
        let err = host.submit("<html></html>").await.unwrap_err();
        assert!(matches!(err, RenderError::Launch { .. }));
    }
}
