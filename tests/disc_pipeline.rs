use std::path::Path;
use std::sync::Arc;

use lopdf::Document;
use lopdf::content::Content;
use permit_disc::core::barcode::EncodeError;
use permit_disc::core::layout::BarcodeFill;
use permit_disc::error::RenderError;
use permit_disc::image::read_barcode;
use permit_disc::render::PrintHost;
use permit_disc::{
    CaptureError, ConsoleConfig, DISC_DIAMETER_MM, DiscLayout, DiscRenderer,
    DiscStyle, ExportCoordinator, ExportError, ExportTarget, ImageSource, Outcome, PermitRecord,
    RenderTarget, Role, compute_layout,
};
use pretty_assertions::assert_eq;
use tokio::sync::Notify;

const PT_PER_MM: f64 = 72.0 / 25.4;

fn record() -> PermitRecord {
    PermitRecord {
        registration_number: "ND 123-456".into(),
        owner_name: "Thandi Mkhize".into(),
        vehicle_make: "Toyota Quantum".into(),
        association_name: "Ilembe Taxi Association".into(),
        issued_date: "01 Mar 2025".into(),
        expiry_date: "28 Feb 2026".into(),
        permit_title: "Taxi Permit".into(),
        authority_name: "KwaDukuza Municipality".into(),
        identifier: String::new(),
        year: Some(2025),
    }
}

fn config(dir: &Path) -> ConsoleConfig {
    let mut config = ConsoleConfig::default();
    config.capture.dpi = 200;
    config.export.output_dir = dir.to_path_buf();
    config
}

fn placed_width_mm(bytes: &[u8]) -> f64 {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    let cm = content
        .operations
        .iter()
        .find(|op| op.operator == "cm")
        .expect("image placement");
    cm.operands[0].as_float().unwrap() as f64 / PT_PER_MM
}

fn scan_barcode(layout: &DiscLayout, dpi: u32) -> String {
    let surface = DiscRenderer::new()
        .render(layout, RenderTarget::Capture { dpi })
        .unwrap();
    read_barcode(surface.raster().unwrap(), layout.barcode().unwrap()).unwrap()
}

fn files_in(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn exports_pdf_named_after_registration() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = ExportCoordinator::new(config(dir.path()));
    let outcome = coordinator
        .run(&record(), &DiscStyle::default(), ExportTarget::Pdf)
        .await;

    let (file, placed_diameter_mm, degraded) = match outcome {
        Outcome::Exported {
            file,
            placed_diameter_mm,
            degraded,
        } => (file, placed_diameter_mm, degraded),
        other => panic!("expected an exported file, got {other:?}"),
    };
    assert_eq!(degraded, None);
    assert_eq!(
        file.file_name().unwrap().to_string_lossy(),
        "Taxi_Permit_ND_123-456.pdf"
    );
    assert!((placed_diameter_mm - DISC_DIAMETER_MM).abs() < 1e-9);
    let bytes = std::fs::read(&file).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    assert!((placed_width_mm(&bytes) - DISC_DIAMETER_MM).abs() < 0.5);
    assert_eq!(files_in(dir.path()), vec!["Taxi_Permit_ND_123-456.pdf"]);

    let layout = compute_layout(&record(), &DiscStyle::default());
    assert_eq!(scan_barcode(&layout, 400), "ND123456");
}

#[tokio::test]
async fn large_scale_truncates_association_and_still_exports() {
    let dir = tempfile::tempdir().unwrap();
    let mut rec = record();
    rec.association_name = "Greater Umzimkhulu Long Distance Taxi Co".into();
    let style = DiscStyle {
        global_scale: 1.5,
        ..DiscStyle::default()
    };

    let layout = compute_layout(&rec, &style);
    let association = &layout.text_runs(Role::Association)[0];
    assert!(association.truncated);
    assert!(association.text.ends_with('…'));
    let registration = layout
        .text_runs(Role::Registration)
        .iter()
        .find(|run| run.text == "ND 123-456")
        .expect("registration run");
    assert!(!registration.truncated);
    assert!((registration.size - 0.085 * 1.5).abs() < 1e-9);
    assert!((registration.anchor_x - 0.5).abs() < 1e-12);
    assert!(layout.validate().is_ok());

    let coordinator = ExportCoordinator::new(config(dir.path()));
    match coordinator.run(&rec, &style, ExportTarget::Pdf).await {
        Outcome::Exported {
            placed_diameter_mm, ..
        } => assert!((placed_diameter_mm - DISC_DIAMETER_MM).abs() < 1e-9),
        other => panic!("expected export, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_background_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let style = DiscStyle {
        background_image: Some(ImageSource::from("http://127.0.0.1:9/rank.jpg")),
        ..DiscStyle::default()
    };
    let coordinator = ExportCoordinator::new(config(dir.path()));
    let before = coordinator.preview(&record(), &style).unwrap();

    let outcome = coordinator.run(&record(), &style, ExportTarget::Pdf).await;
    let err = outcome.error().expect("export should fail");
    assert!(matches!(
        err,
        ExportError::Capture(CaptureError::ImageUnreachable { .. })
    ));
    assert_eq!(err.stage(), "capture");
    assert!(err.advice().contains("background image"));
    assert!(files_in(dir.path()).is_empty());
    assert!(!coordinator.is_busy());

    let after = coordinator.preview(&record(), &style).unwrap();
    assert_eq!(before.markup(), after.markup());
}

#[tokio::test]
async fn unencodable_payload_exports_with_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let mut rec = record();
    rec.identifier = "ABCDEFGHJKLMNPQRSTUVWXYZ".into();

    let layout = compute_layout(&rec, &DiscStyle::default());
    let slot = layout.barcode().expect("slot is always reserved");
    assert!(matches!(slot.fill, BarcodeFill::Placeholder { .. }));
    for role in [
        Role::Header,
        Role::Association,
        Role::Registration,
        Role::DetailRow,
    ] {
        assert!(!layout.text_runs(role).is_empty(), "{role:?} missing");
    }
    assert!(layout.element(Role::GuideRing).is_some());

    let coordinator = ExportCoordinator::new(config(dir.path()));
    match coordinator
        .run(&rec, &DiscStyle::default(), ExportTarget::Pdf)
        .await
    {
        Outcome::Exported { file, degraded, .. } => {
            assert!(matches!(degraded, Some(EncodeError::Unscannable { .. })));
            assert!(file.exists());
        }
        other => panic!("expected degraded export, got {other:?}"),
    }
}

#[test]
fn targets_agree_on_relative_geometry() {
    let layout = compute_layout(&record(), &DiscStyle::default());
    let renderer = DiscRenderer::new();
    let preview = renderer
        .render(&layout, RenderTarget::Preview { container_px: 340.0 })
        .unwrap();
    let print = renderer.render(&layout, RenderTarget::Print).unwrap();
    let capture = renderer
        .render(&layout, RenderTarget::Capture { dpi: 300 })
        .unwrap();

    for placement in &preview.placements {
        let role = placement.role;
        let (px, py) = placement.relative_center();
        let (pw, ph) = placement.relative_extent();
        for other in [&print, &capture] {
            let theirs = other.placement(role).expect("same roles on every target");
            let (ox, oy) = theirs.relative_center();
            let (ow, oh) = theirs.relative_extent();
            assert!((px - ox).abs() < 2e-3 && (py - oy).abs() < 2e-3, "{role:?} centre");
            assert!((pw - ow).abs() < 4e-3 && (ph - oh).abs() < 4e-3, "{role:?} extent");
        }
    }
    assert_eq!(
        capture.raster().unwrap().width() as f64,
        capture.target.diameter()
    );
}

struct GatedPrintHost(Arc<Notify>);

impl PrintHost for GatedPrintHost {
    fn name(&self) -> String {
        "gated".into()
    }

    async fn submit(&self, _document: &str) -> Result<(), RenderError> {
        self.0.notified().await;
        Ok(())
    }
}

#[tokio::test]
async fn second_export_while_in_flight_is_busy() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let coordinator =
        ExportCoordinator::with_print_host(config(dir.path()), GatedPrintHost(gate.clone()));
    let style = DiscStyle::default();
    let rec = record();

    let first = coordinator.run(&rec, &style, ExportTarget::Print);
    let second = async {
        while !coordinator.is_busy() {
            tokio::task::yield_now().await;
        }
        let outcome = coordinator.run(&rec, &style, ExportTarget::Pdf).await;
        gate.notify_one();
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert!(matches!(second, Outcome::Busy));
    assert!(matches!(first, Outcome::Printed { .. }));
    assert!(!coordinator.is_busy());
    assert!(files_in(dir.path()).is_empty());
}
