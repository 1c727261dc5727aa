use permit_disc::config::{MAX_CAPTURE_DPI, MIN_CAPTURE_DPI};
use permit_disc::core::barcode::EncodeError;
use permit_disc::image::read_barcode;
use permit_disc::{
    Code128, Code128Reader, DiscRenderer, DiscStyle, PermitRecord, RenderTarget, Symbology,
    compute_layout, normalize_payload,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_registration(rng: &mut StdRng) -> String {
    let len = rng.random_range(1..=16);
    (0..len)
        .map(|_| char::from(rng.random_range(0x20u8..=0x7e)))
        .collect()
}

fn record(registration: &str) -> PermitRecord {
    PermitRecord {
        registration_number: registration.into(),
        association_name: "Ilembe Taxi".into(),
        vehicle_make: "Toyota".into(),
        ..Default::default()
    }
}

#[test]
fn encoded_modules_decode_to_the_normalized_payload() {
    let mut rng = StdRng::seed_from_u64(0xc0de_0128);
    let symbology = Code128::new();
    let reader = Code128Reader::new();
    for _ in 0..500 {
        let payload = normalize_payload(&random_registration(&mut rng));
        let bitmap = match symbology.encode(&payload) {
            Ok(bitmap) => bitmap,
            Err(EncodeError::Empty) => {
                assert!(payload.is_empty());
                continue;
            }
            Err(err) => panic!("'{payload}' is printable ASCII but failed: {err}"),
        };
        // Three pixels per module on a clean scanline.
        let line: Vec<u8> = bitmap
            .modules()
            .iter()
            .flat_map(|dark| std::iter::repeat_n(if *dark { 0u8 } else { 255 }, 3))
            .collect();
        assert_eq!(reader.decode_scanline(&line).as_deref(), Ok(payload.as_str()));
    }
}

#[test]
fn captured_discs_scan_at_every_density() {
    let mut rng = StdRng::seed_from_u64(0x0d15_c0de);
    let renderer = DiscRenderer::new();
    let mut scanned = 0;
    for case in 0..24 {
        let registration = random_registration(&mut rng);
        let layout = compute_layout(&record(&registration), &DiscStyle::default());
        let Some(slot) = layout.barcode() else {
            panic!("case {case}: no barcode slot");
        };
        if layout.degraded().is_some() {
            continue;
        }
        let dpi = if case % 2 == 0 { MIN_CAPTURE_DPI } else { 400 };
        let surface = renderer
            .render(&layout, RenderTarget::Capture { dpi })
            .unwrap();
        let decoded = read_barcode(surface.raster().unwrap(), slot);
        assert_eq!(
            decoded.as_deref(),
            Ok(layout.payload.as_str()),
            "case {case}: '{registration}' at {dpi} dpi"
        );
        scanned += 1;
    }
    assert!(scanned >= 8, "only {scanned} random payloads produced bars");
}

#[test]
fn widest_scannable_slot_reads_at_the_density_bounds() {
    let layout = compute_layout(&record("ABCDEFGHJKLMNP"), &DiscStyle::default());
    let slot = layout.barcode().unwrap();
    assert!(layout.degraded().is_none());
    for dpi in [MIN_CAPTURE_DPI, MAX_CAPTURE_DPI] {
        let surface = DiscRenderer::new()
            .render(&layout, RenderTarget::Capture { dpi })
            .unwrap();
        assert_eq!(
            read_barcode(surface.raster().unwrap(), slot).as_deref(),
            Ok("ABCDEFGHJKLMNP")
        );
    }
}
