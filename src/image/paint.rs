use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as PixelRect;
use log::debug;

use crate::config::{MAX_CAPTURE_DPI, MIN_CAPTURE_DPI};
use crate::core::layout::{
    BarcodeFill, BarcodeSlot, DISC_DIAMETER_MM, DiscLayout, ElementContent, GuideRing, Rect,
    TextRun,
};
use crate::core::permit::Color;
use crate::core::scan::{Code128Reader, ScanError};
use crate::core::typeface::{CAP_HEIGHT_EM, FaceMetrics};
use crate::error::CaptureError;
use crate::image::glyphs::{GLYPH_HEIGHT, GLYPH_WIDTH, glyph_pattern};
use crate::render::ElementPlacement;

const MM_PER_INCH: f64 = 25.4;
const PAGE_WHITE: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const PLACEHOLDER_BORDER: Rgba<u8> = Rgba([0x94, 0xa3, 0xb8, 0xff]);
/// Horizontal slant of italic glyphs, as a share of the glyph height.
const ITALIC_SHEAR: f64 = 0.2;
const BOLD_STROKE: f64 = 1.35;
/// Narrowest barcode module, in device pixels, that survives edge rounding.
pub const MIN_MODULE_PX: f64 = 3.0;

/// Edge of the square capture raster for `dpi`.
pub fn capture_side_px(dpi: u32) -> u32 {
    let dpi = dpi.clamp(MIN_CAPTURE_DPI, MAX_CAPTURE_DPI);
    (DISC_DIAMETER_MM / MM_PER_INCH * dpi as f64).round() as u32
}

/// Density actually used to capture `layout`: the requested dpi, raised until
/// every barcode module spans at least [`MIN_MODULE_PX`] pixels.
pub fn capture_dpi(layout: &DiscLayout, dpi: u32) -> u32 {
    let dpi = dpi.clamp(MIN_CAPTURE_DPI, MAX_CAPTURE_DPI);
    let Some(BarcodeFill::Bars { module_mm, .. }) = layout.barcode().map(|slot| &slot.fill) else {
        return dpi;
    };
    let needed = (MIN_MODULE_PX * MM_PER_INCH / module_mm).ceil() as u32;
    if needed > dpi {
        debug!("raising capture from {dpi} to {needed} dpi for {module_mm:.3} mm barcode modules");
    }
    dpi.max(needed).min(MAX_CAPTURE_DPI)
}

/// Rasterise `layout` into an opaque square, white outside the disc.
pub fn capture_disc(
    layout: &DiscLayout,
    dpi: u32,
    background: Option<&DynamicImage>,
) -> Result<(RgbaImage, Vec<ElementPlacement>), CaptureError> {
    layout
        .validate()
        .map_err(|err| CaptureError::Raster(err.to_string()))?;

    let dpi = capture_dpi(layout, dpi);
    let side = capture_side_px(dpi);
    if side == 0 {
        return Err(CaptureError::Raster("capture surface has no pixels".into()));
    }
    let d = side as f64;
    debug!("capturing disc at {dpi} dpi into {side}x{side} px");

    let mut canvas: RgbaImage = ImageBuffer::from_pixel(side, side, PAGE_WHITE);
    paint_backdrop(&mut canvas, layout, background);

    let metrics = FaceMetrics::for_class(layout.font);
    let mut placements = Vec::with_capacity(layout.elements.len());
    for element in &layout.elements {
        match &element.content {
            ElementContent::Text(runs) => {
                for run in runs {
                    draw_run(&mut canvas, run, &metrics, d);
                }
            }
            ElementContent::Barcode(slot) => draw_barcode(&mut canvas, slot, d),
            ElementContent::Ring(ring) => draw_ring(&mut canvas, ring, d),
        }
        let (x0, y0, x1, y1) = snap(&element.bounds, d);
        let snapped = Rect::new(
            x0 as f64 / d,
            y0 as f64 / d,
            (x1 - x0) as f64 / d,
            (y1 - y0) as f64 / d,
        );
        placements.push(ElementPlacement::from_rect(element.role, &snapped, d));
    }
    draw_outline(&mut canvas, layout.outline.width, layout.outline.color, d);

    Ok((canvas, placements))
}

/// Decode the barcode along the horizontal centre line of `slot`.
pub fn read_barcode(raster: &RgbaImage, slot: &BarcodeSlot) -> Result<String, ScanError> {
    let d = raster.width() as f64;
    let (x0, _, x1, _) = snap(&slot.rect, d);
    let y = (((slot.rect.y + slot.rect.height / 2.0) * d) as u32).min(raster.height().saturating_sub(1));
    let x0 = x0.max(0) as u32;
    let x1 = (x1.max(0) as u32).min(raster.width());
    let line: Vec<u8> = (x0..x1)
        .map(|x| {
            let [r, g, b, _] = raster.get_pixel(x, y).0;
            ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
        })
        .collect();
    Code128Reader::new().decode_scanline(&line)
}

/// Fail unless the barcode drawn into `raster` reads back as the layout payload.
/// Placeholder slots carry nothing to read and pass.
pub fn verify_capture(raster: &RgbaImage, layout: &DiscLayout) -> Result<(), CaptureError> {
    let Some(slot) = layout.barcode() else {
        return Ok(());
    };
    if !matches!(slot.fill, BarcodeFill::Bars { .. }) {
        return Ok(());
    }
    let unreadable = |reason: String| CaptureError::BarcodeUnreadable {
        payload: layout.payload.clone(),
        reason,
    };
    let decoded = read_barcode(raster, slot).map_err(|err| unreadable(err.to_string()))?;
    if decoded != layout.payload {
        return Err(unreadable(format!("read back as {decoded}")));
    }
    Ok(())
}

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, 0xff])
}

/// Pixel edges of a layout rect, rounded to the device grid.
fn snap(rect: &Rect, d: f64) -> (i32, i32, i32, i32) {
    (
        (rect.x * d).round() as i32,
        (rect.y * d).round() as i32,
        (rect.right() * d).round() as i32,
        (rect.bottom() * d).round() as i32,
    )
}

fn fill_span(canvas: &mut RgbaImage, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba<u8>) {
    let left = x0.round() as i32;
    let top = y0.round() as i32;
    let width = ((x1.round() as i32) - left).max(1) as u32;
    let height = ((y1.round() as i32) - top).max(1) as u32;
    draw_filled_rect_mut(canvas, PixelRect::at(left, top).of_size(width, height), color);
}

/// Distance of the pixel centre `(x, y)` from the disc centre.
fn radius_at(x: u32, y: u32, d: f64) -> f64 {
    let dx = x as f64 + 0.5 - d / 2.0;
    let dy = y as f64 + 0.5 - d / 2.0;
    (dx * dx + dy * dy).sqrt()
}

fn paint_backdrop(canvas: &mut RgbaImage, layout: &DiscLayout, background: Option<&DynamicImage>) {
    let d = canvas.width() as f64;
    let r = d / 2.0;
    let tint = layout.backdrop.tint;
    let photo = background.map(|img| {
        img.resize_to_fill(canvas.width(), canvas.height(), FilterType::Triangle)
            .to_rgba8()
    });

    for (x, y, px) in canvas.enumerate_pixels_mut() {
        if radius_at(x, y, d) > r {
            continue;
        }
        let mut color = tint;
        if let Some(photo) = &photo {
            let Rgba([pr, pg, pb, pa]) = *photo.get_pixel(x, y);
            color = color.blend(Color::rgb(pr, pg, pb), pa as f64 / 255.0);
        }
        if let Some(overlay) = layout.backdrop.overlay {
            color = color.blend(overlay.color, overlay.alpha);
        }
        *px = rgba(color);
    }
}

fn draw_run(canvas: &mut RgbaImage, run: &TextRun, metrics: &FaceMetrics, d: f64) {
    let count = run.text.chars().count();
    if count == 0 {
        return;
    }
    let advance = run.width * d / count as f64;
    let col_w = advance * metrics.cell_em / metrics.advance_em;
    let cap = CAP_HEIGHT_EM * run.size * d;
    let row_h = cap / GLYPH_HEIGHT as f64;
    let cap_top = run.baseline() * d - cap;
    let left = run.left() * d;
    let stroke = if run.emphasis.is_bold() {
        metrics.stroke * BOLD_STROKE
    } else {
        metrics.stroke
    };
    let block_w = col_w * stroke.clamp(0.6, 1.6);
    let inset = (advance - GLYPH_WIDTH as f64 * col_w) / 2.0;
    let color = rgba(run.color);

    for (idx, ch) in run.text.chars().enumerate() {
        let origin = left + idx as f64 * advance + inset;
        for (row, bits) in glyph_pattern(ch).iter().enumerate() {
            let shear = if run.emphasis.is_italic() {
                (GLYPH_HEIGHT - 1 - row) as f64 * row_h * ITALIC_SHEAR
            } else {
                0.0
            };
            let y = cap_top + row as f64 * row_h;
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                    let x = origin + col as f64 * col_w + shear;
                    fill_span(canvas, x, y, x + block_w, y + row_h, color);
                }
            }
        }
    }
}

fn draw_barcode(canvas: &mut RgbaImage, slot: &BarcodeSlot, d: f64) {
    let (x0, y0, x1, y1) = snap(&slot.rect, d);
    let width = (x1 - x0).max(1) as u32;
    let height = (y1 - y0).max(1) as u32;
    match &slot.fill {
        BarcodeFill::Bars { bitmap, .. } => {
            draw_filled_rect_mut(canvas, PixelRect::at(x0, y0).of_size(width, height), PAGE_WHITE);
            let module = width as f64 / bitmap.module_count() as f64;
            let black = Rgba([0, 0, 0, 0xff]);
            for (start, len) in bitmap.bars() {
                let a = x0 as f64 + start as f64 * module;
                let b = x0 as f64 + (start + len) as f64 * module;
                fill_span(canvas, a, y0 as f64, b, y1 as f64, black);
            }
        }
        BarcodeFill::Placeholder { .. } => {
            let border = ((d * 0.0025).round() as u32).max(1);
            for step in 0..border {
                let inner_w = width.saturating_sub(2 * step);
                let inner_h = height.saturating_sub(2 * step);
                if inner_w == 0 || inner_h == 0 {
                    break;
                }
                draw_hollow_rect_mut(
                    canvas,
                    PixelRect::at(x0 + step as i32, y0 + step as i32).of_size(inner_w, inner_h),
                    PLACEHOLDER_BORDER,
                );
            }
        }
    }
}

fn draw_ring(canvas: &mut RgbaImage, ring: &GuideRing, d: f64) {
    let radius = ring.radius() * d;
    let half = (ring.stroke * d / 2.0).max(0.5);
    let dash = (ring.dash * d).max(1.0);
    let color = rgba(ring.color);
    for (x, y, px) in canvas.enumerate_pixels_mut() {
        let dist = radius_at(x, y, d);
        if (dist - radius).abs() > half {
            continue;
        }
        let angle = (y as f64 + 0.5 - d / 2.0).atan2(x as f64 + 0.5 - d / 2.0);
        let arc = (angle + std::f64::consts::PI) * radius;
        if ((arc / dash).floor() as i64) % 2 == 0 {
            *px = color;
        }
    }
}

fn draw_outline(canvas: &mut RgbaImage, width: f64, color: Color, d: f64) {
    let outer = d / 2.0;
    let inner = outer - (width * d).max(1.0);
    let color = rgba(color);
    for (x, y, px) in canvas.enumerate_pixels_mut() {
        let dist = radius_at(x, y, d);
        if dist <= outer && dist > inner {
            *px = color;
        }
    }
}
