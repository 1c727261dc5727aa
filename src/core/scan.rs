//! Scanline reader for Code 128, used to prove a rendered disc still scans.

use thiserror::Error;

use crate::core::barcode::{
    CODE_A, CODE_B, CODE_C, PATTERNS, START_A, START_B, START_C, STOP_PATTERN, checksum,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("scanline has no usable contrast")]
    NoContrast,
    #[error("no start symbol found")]
    NoStart,
    #[error("unrecognised symbol at element {0}")]
    BadSymbol(usize),
    #[error("symbol ended without a stop pattern")]
    NoStop,
    #[error("checksum mismatch (expected {expected}, read {found})")]
    Checksum { expected: u8, found: u8 },
    #[error("symbol value {0} is not supported by this reader")]
    Unsupported(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeSet {
    A,
    B,
    C,
}

/// Decodes Code 128 from a row of luminance samples (0 = black, 255 = white).
#[derive(Debug, Default, Clone, Copy)]
pub struct Code128Reader;

impl Code128Reader {
    pub fn new() -> Self {
        Self
    }

    pub fn decode_scanline(&self, luma: &[u8]) -> Result<String, ScanError> {
        let runs = binarize(luma)?;
        let first_bar = runs
            .iter()
            .position(|(dark, _)| *dark)
            .ok_or(ScanError::NoStart)?;
        let widths: Vec<usize> = runs[first_bar..].iter().map(|(_, len)| *len).collect();

        let mut values = Vec::new();
        let mut cursor = 0;
        loop {
            if cursor + 6 > widths.len() {
                return Err(ScanError::NoStop);
            }
            match classify(&widths[cursor..cursor + 6]) {
                Some(value) => {
                    if values.is_empty() && !matches!(value, START_A | START_B | START_C) {
                        return Err(ScanError::NoStart);
                    }
                    values.push(value);
                    cursor += 6;
                }
                None if !values.is_empty()
                    && cursor + STOP_PATTERN.len() <= widths.len()
                    && matches_pattern(&widths[cursor..cursor + 7], &STOP_PATTERN) =>
                {
                    break;
                }
                None => return Err(ScanError::BadSymbol(cursor)),
            }
        }

        if values.len() < 2 {
            return Err(ScanError::NoStop);
        }
        let (data, check) = values.split_at(values.len() - 1);
        let expected = checksum(data);
        if expected != check[0] {
            return Err(ScanError::Checksum {
                expected,
                found: check[0],
            });
        }
        translate(data)
    }
}

fn binarize(luma: &[u8]) -> Result<Vec<(bool, usize)>, ScanError> {
    let min = luma.iter().copied().min().unwrap_or(0);
    let max = luma.iter().copied().max().unwrap_or(0);
    if max.saturating_sub(min) < 48 {
        return Err(ScanError::NoContrast);
    }
    let threshold = ((min as u16 + max as u16) / 2) as u8;
    let mut runs: Vec<(bool, usize)> = Vec::new();
    for sample in luma {
        let dark = *sample < threshold;
        match runs.last_mut() {
            Some((last, len)) if *last == dark => *len += 1,
            _ => runs.push((dark, 1)),
        }
    }
    Ok(runs)
}

fn normalized(widths: &[usize], modules: f64) -> Vec<u8> {
    let total: usize = widths.iter().sum();
    let unit = total as f64 / modules;
    widths
        .iter()
        .map(|w| ((*w as f64 / unit).round() as u8).clamp(1, 4))
        .collect()
}

fn matches_pattern(widths: &[usize], pattern: &[u8]) -> bool {
    let modules: u8 = pattern.iter().sum();
    normalized(widths, modules as f64) == pattern
}

fn classify(widths: &[usize]) -> Option<u8> {
    let norm = normalized(widths, 11.0);
    PATTERNS
        .iter()
        .position(|p| p[..] == norm[..])
        .map(|idx| idx as u8)
}

fn translate(values: &[u8]) -> Result<String, ScanError> {
    let mut set = match values.first() {
        Some(&START_A) => CodeSet::A,
        Some(&START_B) => CodeSet::B,
        Some(&START_C) => CodeSet::C,
        _ => return Err(ScanError::NoStart),
    };
    let mut out = String::new();
    for value in &values[1..] {
        let value = *value;
        match (set, value) {
            (CodeSet::A | CodeSet::B, CODE_C) => set = CodeSet::C,
            (CodeSet::A | CodeSet::C, CODE_B) => set = CodeSet::B,
            (CodeSet::B | CodeSet::C, CODE_A) => set = CodeSet::A,
            (CodeSet::C, v) if v < 100 => out.push_str(&format!("{v:02}")),
            (CodeSet::B, v) if v < 96 => out.push((v + 32) as char),
            (CodeSet::A, v) if v < 64 => out.push((v + 32) as char),
            (CodeSet::A, v) if v < 96 => out.push((v - 64) as char),
            (_, v) => return Err(ScanError::Unsupported(v)),
        }
    }
    Ok(out)
}
