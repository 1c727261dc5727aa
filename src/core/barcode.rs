//! Code 128 encoder producing the module pattern printed at the foot of the disc.
//!
//! A module is the narrowest bar/space unit. The pattern carries its quiet
//! zones so the drawable width is always `module_count() * module_width`.

use serde::Serialize;
use thiserror::Error;

/// Narrowest module width (mm) handheld scanners read reliably.
pub const MIN_MODULE_MM: f64 = 0.25;
/// Light modules required on either side of the symbol.
pub const QUIET_ZONE_MODULES: usize = 10;
/// Payloads longer than this are refused before encoding.
pub const MAX_PAYLOAD_CHARS: usize = 48;

pub(crate) const START_A: u8 = 103;
pub(crate) const START_B: u8 = 104;
pub(crate) const START_C: u8 = 105;
pub(crate) const CODE_A: u8 = 101;
pub(crate) const CODE_B: u8 = 100;
pub(crate) const CODE_C: u8 = 99;
pub(crate) const STOP_PATTERN: [u8; 7] = [2, 3, 3, 1, 1, 1, 2];

/// Bar/space widths for symbol values 0..=105, bar first.
#[rustfmt::skip]
pub(crate) const PATTERNS: [[u8; 6]; 106] = [
    [2,1,2,2,2,2], [2,2,2,1,2,2], [2,2,2,2,2,1], [1,2,1,2,2,3], [1,2,1,3,2,2],
    [1,3,1,2,2,2], [1,2,2,2,1,3], [1,2,2,3,1,2], [1,3,2,2,1,2], [2,2,1,2,1,3],
    [2,2,1,3,1,2], [2,3,1,2,1,2], [1,1,2,2,3,2], [1,2,2,1,3,2], [1,2,2,2,3,1],
    [1,1,3,2,2,2], [1,2,3,1,2,2], [1,2,3,2,2,1], [2,2,3,2,1,1], [2,2,1,1,3,2],
    [2,2,1,2,3,1], [2,1,3,2,1,2], [2,2,3,1,1,2], [3,1,2,1,3,1], [3,1,1,2,2,2],
    [3,2,1,1,2,2], [3,2,1,2,2,1], [3,1,2,2,1,2], [3,2,2,1,1,2], [3,2,2,2,1,1],
    [2,1,2,1,2,3], [2,1,2,3,2,1], [2,3,2,1,2,1], [1,1,1,3,2,3], [1,3,1,1,2,3],
    [1,3,1,3,2,1], [1,1,2,3,1,3], [1,3,2,1,1,3], [1,3,2,3,1,1], [2,1,1,3,1,3],
    [2,3,1,1,1,3], [2,3,1,3,1,1], [1,1,2,1,3,3], [1,1,2,3,3,1], [1,3,2,1,3,1],
    [1,1,3,1,2,3], [1,1,3,3,2,1], [1,3,3,1,2,1], [3,1,3,1,2,1], [2,1,1,3,3,1],
    [2,3,1,1,3,1], [2,1,3,1,1,3], [2,1,3,3,1,1], [2,1,3,1,3,1], [3,1,1,1,2,3],
    [3,1,1,3,2,1], [3,3,1,1,2,1], [3,1,2,1,1,3], [3,1,2,3,1,1], [3,3,2,1,1,1],
    [3,1,4,1,1,1], [2,2,1,4,1,1], [4,3,1,1,1,1], [1,1,1,2,2,4], [1,1,1,4,2,2],
    [1,2,1,1,2,4], [1,2,1,4,2,1], [1,4,1,1,2,2], [1,4,1,2,2,1], [1,1,2,2,1,4],
    [1,1,2,4,1,2], [1,2,2,1,1,4], [1,2,2,4,1,1], [1,4,2,1,1,2], [1,4,2,2,1,1],
    [2,4,1,2,1,1], [2,2,1,1,1,4], [4,1,3,1,1,1], [2,4,1,1,1,2], [1,3,4,1,1,1],
    [1,1,1,2,4,2], [1,2,1,1,4,2], [1,2,1,2,4,1], [1,1,4,2,1,2], [1,2,4,1,1,2],
    [1,2,4,2,1,1], [4,1,1,2,1,2], [4,2,1,1,1,2], [4,2,1,2,1,1], [2,1,2,1,4,1],
    [2,1,4,1,2,1], [4,1,2,1,2,1], [1,1,1,1,4,3], [1,1,1,3,4,1], [1,3,1,1,4,1],
    [1,1,4,1,1,3], [1,1,4,3,1,1], [4,1,1,1,1,3], [4,1,1,3,1,1], [1,1,3,1,4,1],
    [1,1,4,1,3,1], [3,1,1,1,4,1], [4,1,1,1,3,1], [2,1,1,4,1,2], [2,1,1,2,1,4],
    [2,1,1,2,3,2],
];

#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum EncodeError {
    #[error("barcode payload is empty")]
    Empty,
    #[error("unsupported barcode character: '{0}' (U+{1:04X})")]
    Unsupported(char, u32),
    #[error("barcode payload has {0} characters (limit {MAX_PAYLOAD_CHARS})")]
    TooLong(usize),
    #[error(
        "barcode needs {required_mm:.1} mm to keep {MIN_MODULE_MM} mm modules but only {available_mm:.1} mm fit on the disc"
    )]
    Unscannable { required_mm: f64, available_mm: f64 },
}

/// Raised when a slot is too narrow for the scannability floor. The caller
/// is expected to widen the slot to at least `required_mm`.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("slot of {slot_mm:.1} mm is narrower than the {required_mm:.1} mm needed for scannable modules")]
pub struct SlotTooNarrow {
    pub slot_mm: f64,
    pub required_mm: f64,
}

/// Encoded symbol: payload plus its module pattern (quiet zones included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarcodeBitmap {
    payload: String,
    #[serde(serialize_with = "serialize_modules")]
    modules: Vec<bool>,
}

impl BarcodeBitmap {
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// `true` marks a dark module.
    pub fn modules(&self) -> &[bool] {
        &self.modules
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Dark runs as `(first_module, length)` pairs.
    pub fn bars(&self) -> Vec<(usize, usize)> {
        let mut runs = Vec::new();
        let mut start = None;
        for (idx, dark) in self.modules.iter().enumerate() {
            match (dark, start) {
                (true, None) => start = Some(idx),
                (false, Some(s)) => {
                    runs.push((s, idx - s));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push((s, self.modules.len() - s));
        }
        runs
    }

    /// Width-over-height ratio when drawn `height_modules` modules tall.
    pub fn aspect_ratio(&self, height_modules: f64) -> f64 {
        self.module_count() as f64 / height_modules.max(1.0)
    }

    /// Narrowest printed width that keeps every module at the scannability floor.
    pub fn min_width_mm(&self) -> f64 {
        self.module_count() as f64 * MIN_MODULE_MM
    }

    /// Module width (mm) when the pattern is stretched across `slot_mm`.
    pub fn module_width_mm(&self, slot_mm: f64) -> f64 {
        slot_mm / self.module_count() as f64
    }

    /// Accept `slot_mm` only if it keeps modules at or above [`MIN_MODULE_MM`].
    pub fn fit(&self, slot_mm: f64) -> Result<f64, SlotTooNarrow> {
        let module = self.module_width_mm(slot_mm);
        // Tolerate float noise so a slot widened to exactly `min_width_mm` is accepted.
        if module + 1e-9 < MIN_MODULE_MM {
            return Err(SlotTooNarrow {
                slot_mm,
                required_mm: self.min_width_mm(),
            });
        }
        Ok(module)
    }
}

fn serialize_modules<S: serde::Serializer>(modules: &[bool], s: S) -> Result<S::Ok, S::Error> {
    let text: String = modules.iter().map(|m| if *m { '1' } else { '0' }).collect();
    s.serialize_str(&text)
}

/// Linear symbology able to turn a normalized payload into modules.
pub trait Symbology {
    fn name(&self) -> &'static str;
    fn encode(&self, payload: &str) -> Result<BarcodeBitmap, EncodeError>;
    fn is_supported(&self, ch: char) -> bool;
}

/// Code 128 with automatic code set B/C selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct Code128;

impl Code128 {
    pub fn new() -> Self {
        Self
    }

    /// Symbol values (start..checksum, stop excluded) for `payload`.
    fn symbol_values(&self, payload: &str) -> Vec<u8> {
        let bytes = payload.as_bytes();
        let mut values = Vec::with_capacity(bytes.len() + 4);
        let mut in_c: Option<bool> = None;
        let mut idx = 0;
        while idx < bytes.len() {
            let run = bytes[idx..].iter().take_while(|b| b.is_ascii_digit()).count();
            let use_c = run >= 4 || (in_c == Some(true) && run >= 2);
            if use_c {
                match in_c {
                    None => values.push(START_C),
                    Some(false) => values.push(CODE_C),
                    Some(true) => {}
                }
                in_c = Some(true);
                let pairs = run / 2;
                for pair in 0..pairs {
                    let at = idx + pair * 2;
                    values.push((bytes[at] - b'0') * 10 + (bytes[at + 1] - b'0'));
                }
                idx += pairs * 2;
            } else {
                match in_c {
                    None => values.push(START_B),
                    Some(true) => values.push(CODE_B),
                    Some(false) => {}
                }
                in_c = Some(false);
                values.push(bytes[idx] - 32);
                idx += 1;
            }
        }
        values.push(checksum(&values));
        values
    }
}

impl Symbology for Code128 {
    fn name(&self) -> &'static str {
        "Code 128"
    }

    fn is_supported(&self, ch: char) -> bool {
        (' '..='~').contains(&ch)
    }

    fn encode(&self, payload: &str) -> Result<BarcodeBitmap, EncodeError> {
        if payload.is_empty() {
            return Err(EncodeError::Empty);
        }
        if let Some(bad) = payload.chars().find(|ch| !self.is_supported(*ch)) {
            return Err(EncodeError::Unsupported(bad, bad as u32));
        }
        let len = payload.chars().count();
        if len > MAX_PAYLOAD_CHARS {
            return Err(EncodeError::TooLong(len));
        }

        let values = self.symbol_values(payload);
        let mut modules = vec![false; QUIET_ZONE_MODULES];
        for value in &values {
            push_widths(&mut modules, &PATTERNS[*value as usize]);
        }
        push_widths(&mut modules, &STOP_PATTERN);
        modules.extend(std::iter::repeat_n(false, QUIET_ZONE_MODULES));

        Ok(BarcodeBitmap {
            payload: payload.to_string(),
            modules,
        })
    }
}

fn push_widths(modules: &mut Vec<bool>, widths: &[u8]) {
    for (idx, width) in widths.iter().enumerate() {
        let dark = idx % 2 == 0;
        modules.extend(std::iter::repeat_n(dark, *width as usize));
    }
}

/// Mod-103 weighted checksum over start symbol and data values.
pub(crate) fn checksum(values: &[u8]) -> u8 {
    let sum: u32 = values
        .iter()
        .enumerate()
        .map(|(pos, value)| *value as u32 * (pos as u32).max(1))
        .sum();
    (sum % 103) as u8
}

/// Turn a registration number or identifier into the barcode payload:
/// whitespace and the separators `-`, `/`, `.` are dropped, letters upper-cased.
pub fn normalize_payload(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !ch.is_whitespace() && !matches!(ch, '-' | '/' | '.'))
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}
