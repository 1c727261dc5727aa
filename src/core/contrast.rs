//! Relative luminance and contrast ratio (WCAG 2.x definitions) used to keep
//! disc text legible over any tint or photo.

use crate::core::permit::Color;

/// Minimum ratio between every text color and whatever sits behind it.
pub const MIN_CONTRAST_RATIO: f64 = 4.5;

fn channel_to_linear(c: u8) -> f64 {
    let v = c as f64 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

pub fn relative_luminance(color: Color) -> f64 {
    0.2126 * channel_to_linear(color.r)
        + 0.7152 * channel_to_linear(color.g)
        + 0.0722 * channel_to_linear(color.b)
}

pub fn contrast_ratio(a: Color, b: Color) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    let (hi, lo) = if la >= lb { (la, lb) } else { (lb, la) };
    (hi + 0.05) / (lo + 0.05)
}

/// Smallest opacity of a `veil` layer over `background` such that every
/// color in `texts` reaches `min_ratio` against the blend. Returns 0.0 when
/// the background already qualifies and 1.0 when even a full veil falls short.
pub fn required_overlay_alpha(background: Color, veil: Color, texts: &[Color], min_ratio: f64) -> f64 {
    let passes = |alpha: f64| {
        let blended = background.blend(veil, alpha);
        texts
            .iter()
            .all(|text| contrast_ratio(*text, blended) >= min_ratio)
    };
    if passes(0.0) {
        return 0.0;
    }
    if !passes(1.0) {
        return 1.0;
    }
    // Contrast against dark text grows monotonically as a light veil thickens.
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..32 {
        let mid = (lo + hi) / 2.0;
        if passes(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}
