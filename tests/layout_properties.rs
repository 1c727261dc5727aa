use permit_disc::core::layout::{BarcodeFill, Role};
use permit_disc::core::permit::{MAX_GLOBAL_SCALE, MIN_GLOBAL_SCALE};
use permit_disc::{DiscStyle, FontClass, PermitRecord, TextEmphasis, compute_layout};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ abcdefghijklmnopqrstuvwxyz 0123456789 -/&.'";

fn random_text(rng: &mut StdRng, max_len: usize) -> String {
    let len = rng.random_range(0..=max_len);
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

fn random_record(rng: &mut StdRng) -> PermitRecord {
    PermitRecord {
        registration_number: random_text(rng, 24),
        owner_name: random_text(rng, 120),
        vehicle_make: random_text(rng, 60),
        association_name: random_text(rng, 120),
        issued_date: random_text(rng, 20),
        expiry_date: random_text(rng, 20),
        permit_title: random_text(rng, 40),
        authority_name: random_text(rng, 120),
        identifier: if rng.random_bool(0.3) {
            random_text(rng, 30)
        } else {
            String::new()
        },
        year: rng.random_bool(0.5).then(|| rng.random_range(2000..2040)),
    }
}

fn random_style(rng: &mut StdRng) -> DiscStyle {
    let fonts = [
        FontClass::Sans,
        FontClass::Serif,
        FontClass::Mono,
        FontClass::Display,
    ];
    let emphases = [
        TextEmphasis::Normal,
        TextEmphasis::Italic,
        TextEmphasis::Bold,
        TextEmphasis::BoldItalic,
    ];
    DiscStyle {
        font_class: fonts[rng.random_range(0..fonts.len())],
        global_scale: rng.random_range(MIN_GLOBAL_SCALE..=MAX_GLOBAL_SCALE),
        authority_emphasis: emphases[rng.random_range(0..emphases.len())],
        ..DiscStyle::default()
    }
}

#[test]
fn random_records_always_fit_their_bands() {
    let mut rng = StdRng::seed_from_u64(0x5eed_d15c);
    for case in 0..300 {
        let record = random_record(&mut rng);
        let style = random_style(&mut rng);
        let layout = compute_layout(&record, &style);

        if let Err(err) = layout.validate() {
            panic!("case {case}: {err}\nrecord: {record:?}\nstyle: {style:?}");
        }
        for (i, a) in layout.elements.iter().enumerate() {
            for b in &layout.elements[i + 1..] {
                if let (Some(x), Some(y)) = (a.band, b.band) {
                    assert!(!x.overlaps(&y), "case {case}: {:?} overlaps {:?}", a.role, b.role);
                }
            }
        }
        for run in layout.text_runs(Role::Association) {
            assert!(run.bounds().inside_disc(), "case {case}: association escapes disc");
        }
        if let Some(slot) = layout.barcode() {
            if let BarcodeFill::Bars { module_mm, .. } = &slot.fill {
                assert!(*module_mm >= 0.25 - 1e-9, "case {case}: module {module_mm} mm");
            }
        }
    }
}

#[test]
fn identical_inputs_give_identical_layouts() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let record = random_record(&mut rng);
        let style = random_style(&mut rng);
        assert_eq!(compute_layout(&record, &style), compute_layout(&record, &style));
    }
}
