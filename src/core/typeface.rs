//! Resolution-independent font metrics shared by every render target.
//!
//! Sizes are em heights expressed as fractions of the disc diameter. Widths
//! computed here are authoritative: vector targets stretch their glyphs to
//! the measured width, the raster target draws its bitmap glyphs into it.

use serde::Serialize;

use crate::core::permit::{FontClass, TextEmphasis};

/// Cap height as a fraction of the em size.
pub const CAP_HEIGHT_EM: f64 = 0.7;
/// Line box height as a fraction of the em size.
pub const LINE_HEIGHT_EM: f64 = 1.2;
/// Text is never shrunk below this share of its resolved size before truncating.
pub const MIN_SHRINK: f64 = 0.7;
/// Absolute legibility floor for any run (fraction of the diameter, ~1.3 mm on a 90 mm disc).
pub const MIN_TEXT_SIZE: f64 = 0.014;
pub const ELLIPSIS: char = '…';

/// Per-family glyph geometry for the 5x7 raster glyph grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceMetrics {
    /// Horizontal advance per character, in em.
    pub advance_em: f64,
    /// Width of one glyph grid cell, in em.
    pub cell_em: f64,
    /// Stroke thickness multiplier applied when painting.
    pub stroke: f64,
    /// CSS font stack for the vector targets.
    pub css_family: &'static str,
}

impl FaceMetrics {
    pub fn for_class(class: FontClass) -> Self {
        match class {
            FontClass::Sans => FaceMetrics {
                advance_em: 0.60,
                cell_em: 0.10,
                stroke: 1.0,
                css_family: "'Inter', 'Helvetica Neue', Arial, sans-serif",
            },
            FontClass::Serif => FaceMetrics {
                advance_em: 0.62,
                cell_em: 0.104,
                stroke: 0.9,
                css_family: "Georgia, 'Times New Roman', serif",
            },
            FontClass::Mono => FaceMetrics {
                advance_em: 0.66,
                cell_em: 0.10,
                stroke: 1.0,
                css_family: "'JetBrains Mono', 'Courier New', monospace",
            },
            FontClass::Display => FaceMetrics {
                advance_em: 0.68,
                cell_em: 0.112,
                stroke: 1.2,
                css_family: "'Archivo Black', Impact, 'Arial Black', sans-serif",
            },
        }
    }

    /// Advance width of `text` at `size`, with bold runs slightly wider.
    pub fn measure(&self, text: &str, size: f64, emphasis: TextEmphasis) -> f64 {
        let chars = text.chars().count() as f64;
        chars * self.advance_em * size * emphasis_widening(emphasis)
    }
}

fn emphasis_widening(emphasis: TextEmphasis) -> f64 {
    if emphasis.is_bold() { 1.04 } else { 1.0 }
}

/// Outcome of fitting a run into a fixed width.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedText {
    pub text: String,
    pub size: f64,
    pub width: f64,
    pub shrunk: bool,
    pub truncated: bool,
}

/// Fit `text` into `max_width`: keep `size` if it fits, else shrink down to
/// `MIN_SHRINK * size` (never below [`MIN_TEXT_SIZE`]), else truncate with an
/// ellipsis at the smallest size.
pub fn fit_text(
    metrics: &FaceMetrics,
    text: &str,
    size: f64,
    max_width: f64,
    emphasis: TextEmphasis,
) -> FittedText {
    let natural = metrics.measure(text, size, emphasis);
    if natural <= max_width || text.is_empty() {
        return FittedText {
            text: text.to_string(),
            size,
            width: natural,
            shrunk: false,
            truncated: false,
        };
    }

    let floor = (size * MIN_SHRINK).max(MIN_TEXT_SIZE).min(size);
    let needed = size * max_width / natural;
    if needed >= floor {
        return FittedText {
            text: text.to_string(),
            size: needed,
            width: metrics.measure(text, needed, emphasis),
            shrunk: true,
            truncated: false,
        };
    }

    let per_char = metrics.measure("M", floor, emphasis);
    let capacity = (max_width / per_char).floor() as usize;
    let kept: String = if capacity <= 1 {
        ELLIPSIS.to_string()
    } else {
        let mut s: String = text.chars().take(capacity - 1).collect();
        let trimmed_len = s.trim_end().len();
        s.truncate(trimmed_len);
        s.push(ELLIPSIS);
        s
    };
    FittedText {
        width: metrics.measure(&kept, floor, emphasis),
        text: kept,
        size: floor,
        shrunk: floor < size,
        truncated: true,
    }
}
