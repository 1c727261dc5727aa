//! Orchestrates encode, layout, render, capture and export for one user action.

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::ConsoleConfig;
use crate::core::barcode::EncodeError;
use crate::core::layout::{DiscLayout, DiscLayoutEngine};
use crate::core::permit::{DiscStyle, PermitRecord};
use crate::error::{CaptureError, ExportError, SerializeError};
use crate::export::pdf::PdfExporter;
use crate::image::{load_background, verify_capture};
use crate::render::{
    CommandPrintHost, DiscRenderer, PrintHost, RenderTarget, RenderedSurface, SurfaceContent,
};

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportTarget {
    Pdf,
    Print,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Idle,
    Encoding,
    LayingOut,
    Rendering,
    Capturing,
    Exporting,
    Done,
    /// Carries the name of the stage that failed.
    Failed(&'static str),
}

#[derive(Debug)]
pub enum Outcome {
    Exported {
        file: PathBuf,
        placed_diameter_mm: f64,
        /// Set when the disc went out with a placeholder instead of a barcode.
        degraded: Option<EncodeError>,
    },
    Printed {
        host: String,
        degraded: Option<EncodeError>,
    },
    Failed(ExportError),
    /// Another export is still in flight; nothing was touched.
    Busy,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Exported { .. } | Outcome::Printed { .. })
    }

    pub fn error(&self) -> Option<&ExportError> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ExportCoordinator<H: PrintHost = CommandPrintHost> {
    config: ConsoleConfig,
    engine: DiscLayoutEngine,
    exporter: PdfExporter,
    print_host: H,
    in_flight: AtomicBool,
    stage: watch::Sender<Stage>,
    history: Mutex<Vec<Stage>>,
}

impl ExportCoordinator<CommandPrintHost> {
    pub fn new(config: ConsoleConfig) -> Self {
        let host = CommandPrintHost::from_config(&config.print);
        Self::with_print_host(config, host)
    }
}

impl<H: PrintHost> ExportCoordinator<H> {
    pub fn with_print_host(config: ConsoleConfig, print_host: H) -> Self {
        let (stage, _) = watch::channel(Stage::Idle);
        Self {
            config,
            engine: DiscLayoutEngine::new(),
            exporter: PdfExporter::new(),
            print_host,
            in_flight: AtomicBool::new(false),
            stage,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn with_exporter(mut self, exporter: PdfExporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        *self.stage.borrow()
    }

    /// Observe stage transitions, e.g. to disable an export button.
    pub fn subscribe(&self) -> watch::Receiver<Stage> {
        self.stage.subscribe()
    }

    /// Stages visited by the most recent run, in order.
    pub fn last_run_stages(&self) -> Vec<Stage> {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Interactive preview for the configured container. Independent of any
    /// export, so a failed export never disturbs it.
    pub fn preview(
        &self,
        record: &PermitRecord,
        style: &DiscStyle,
    ) -> Result<RenderedSurface, ExportError> {
        let layout = self.engine.compute(record, style);
        DiscRenderer::new().render(
            &layout,
            RenderTarget::Preview {
                container_px: self.config.preview.container_px,
            },
        )
    }

    pub async fn run(&self, record: &PermitRecord, style: &DiscStyle, target: ExportTarget) -> Outcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(
                "export of {} rejected: another export is in flight",
                record.registration_number
            );
            return Outcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);
        if let Ok(mut history) = self.history.lock() {
            history.clear();
        }

        match self.pipeline(record, style, target).await {
            Ok(outcome) => {
                self.transition(Stage::Done);
                outcome
            }
            Err(err) => {
                error!("{} failed at {}: {err}", describe(target), err.stage());
                self.transition(Stage::Failed(err.stage()));
                Outcome::Failed(err)
            }
        }
    }

    fn transition(&self, stage: Stage) {
        info!("export stage -> {stage:?}");
        if let Ok(mut history) = self.history.lock() {
            history.push(stage);
        }
        self.stage.send_replace(stage);
    }

    async fn pipeline(
        &self,
        record: &PermitRecord,
        style: &DiscStyle,
        target: ExportTarget,
    ) -> Result<Outcome, ExportError> {
        self.transition(Stage::Encoding);
        let barcode = self.engine.encode(record);

        self.transition(Stage::LayingOut);
        let layout = self.engine.compute_with_barcode(record, style, barcode);
        // The slot may still refuse an encoded payload that is too wide to scan.
        let degraded = layout.degraded().cloned();
        if let Some(err) = &degraded {
            if self.config.export.require_barcode {
                return Err(err.clone().into());
            }
            warn!("continuing with a placeholder barcode: {err}");
        }

        self.transition(Stage::Rendering);
        match target {
            ExportTarget::Print => {
                let surface = DiscRenderer::new().render(&layout, RenderTarget::Print)?;
                let document = surface.markup().unwrap_or_default();
                self.print_host.submit(document).await?;
                Ok(Outcome::Printed {
                    host: self.print_host.name(),
                    degraded,
                })
            }
            ExportTarget::Pdf => {
                let surface = self.render_capture(&layout, style).await?;

                self.transition(Stage::Capturing);
                let raster = match surface.content {
                    SurfaceContent::Raster(raster) => raster,
                    _ => return Err(CaptureError::Raster("capture produced no raster".into()).into()),
                };
                verify_capture(&raster, &layout)?;

                self.transition(Stage::Exporting);
                let exporter = self.exporter.clone();
                let file_name = record.export_file_name();
                let file = tokio::task::spawn_blocking(move || exporter.export_pdf(&raster, &file_name))
                    .await
                    .map_err(|err| SerializeError::Task(err.to_string()))??;
                let path = file.write_into(&self.config.export.output_dir).await?;
                Ok(Outcome::Exported {
                    file: path,
                    placed_diameter_mm: file.placed_diameter_mm,
                    degraded,
                })
            }
        }
    }

    /// Load the background and render the Capture target, bounded by the
    /// capture timeout as a whole.
    async fn render_capture(
        &self,
        layout: &DiscLayout,
        style: &DiscStyle,
    ) -> Result<RenderedSurface, ExportError> {
        let budget = self.config.capture.timeout();
        let started = Instant::now();
        let background = match &style.background_image {
            Some(source) => Some(load_background(source, budget).await?),
            None => None,
        };

        let dpi = self.config.capture.effective_dpi();
        let remaining = budget.saturating_sub(started.elapsed());
        let layout = layout.clone();
        let task = tokio::task::spawn_blocking(move || {
            DiscRenderer::with_background(background).render(&layout, RenderTarget::Capture { dpi })
        });
        let surface = match tokio::time::timeout(remaining, task).await {
            Err(_) => {
                return Err(CaptureError::Timeout {
                    ms: budget.as_millis() as u64,
                }
                .into());
            }
            Ok(Err(join)) => return Err(CaptureError::Raster(join.to_string()).into()),
            Ok(Ok(surface)) => surface?,
        };
        Ok(surface)
    }
}

fn describe(target: ExportTarget) -> &'static str {
    match target {
        ExportTarget::Pdf => "PDF export",
        ExportTarget::Print => "print",
    }
}
