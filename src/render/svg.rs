//! Vector rendering shared by the Preview and Print targets.

use std::fmt::Write;

use crate::core::layout::{
    BarcodeFill, BarcodeSlot, DiscLayout, ElementContent, GuideRing, TextAlign, TextRun,
};
use crate::core::typeface::FaceMetrics;
use crate::error::RenderError;
use crate::render::{ElementPlacement, escape_xml};

const PLACEHOLDER_STROKE: &str = "#94a3b8";

/// Render the interactive preview as a standalone SVG sized in CSS px.
pub fn render_preview_svg(
    layout: &DiscLayout,
    container_px: f64,
) -> Result<(String, Vec<ElementPlacement>), RenderError> {
    let mut out = String::new();
    let size = format!("{container_px:.3}px");
    let placements = write_disc_svg(&mut out, layout, container_px, &size)?;
    Ok((out, placements))
}

/// Write one `<svg>` element whose user space spans `unit` per disc diameter
/// and whose rendered size is `size` (any CSS length).
pub(crate) fn write_disc_svg(
    out: &mut String,
    layout: &DiscLayout,
    unit: f64,
    size: &str,
) -> Result<Vec<ElementPlacement>, RenderError> {
    let c = unit / 2.0;
    let metrics = FaceMetrics::for_class(layout.font);

    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {unit:.3} {unit:.3}" role="img" aria-label="Permit disc {}">"#,
        escape_xml(&layout.payload)
    )?;
    writeln!(
        out,
        r#"<defs><clipPath id="disc-clip"><circle cx="{c:.3}" cy="{c:.3}" r="{c:.3}"/></clipPath></defs>"#
    )?;
    writeln!(
        out,
        r#"<circle cx="{c:.3}" cy="{c:.3}" r="{c:.3}" fill="{}"/>"#,
        layout.backdrop.tint
    )?;
    if let Some(image) = &layout.backdrop.image {
        writeln!(
            out,
            r#"<image href="{}" x="0" y="0" width="{unit:.3}" height="{unit:.3}" preserveAspectRatio="xMidYMid slice" clip-path="url(#disc-clip)"/>"#,
            escape_xml(&image.href())
        )?;
    }
    if let Some(overlay) = layout.backdrop.overlay {
        writeln!(
            out,
            r#"<circle cx="{c:.3}" cy="{c:.3}" r="{c:.3}" fill="{}" fill-opacity="{:.3}"/>"#,
            overlay.color, overlay.alpha
        )?;
    }

    writeln!(
        out,
        r#"<g font-family="{}">"#,
        escape_xml(metrics.css_family)
    )?;
    let mut placements = Vec::with_capacity(layout.elements.len());
    for element in &layout.elements {
        writeln!(out, r#"<g data-role="{}">"#, element.role.name())?;
        match &element.content {
            ElementContent::Text(runs) => {
                for run in runs {
                    write_text(out, run, unit)?;
                }
            }
            ElementContent::Barcode(slot) => write_barcode(out, slot, unit)?,
            ElementContent::Ring(ring) => write_ring(out, ring, unit)?,
        }
        writeln!(out, "</g>")?;
        placements.push(ElementPlacement::from_rect(
            element.role,
            &element.bounds,
            unit,
        ));
    }
    writeln!(out, "</g>")?;

    let outline = layout.outline.width * unit;
    writeln!(
        out,
        r#"<circle cx="{c:.3}" cy="{c:.3}" r="{:.3}" fill="none" stroke="{}" stroke-width="{outline:.3}"/>"#,
        c - outline / 2.0,
        layout.outline.color
    )?;
    writeln!(out, "</svg>")?;
    Ok(placements)
}

fn write_text(out: &mut String, run: &TextRun, unit: f64) -> Result<(), RenderError> {
    let anchor = match run.align {
        TextAlign::Start => "start",
        TextAlign::Center => "middle",
        TextAlign::End => "end",
    };
    let weight = if run.emphasis.is_bold() { "700" } else { "400" };
    let style = if run.emphasis.is_italic() { "italic" } else { "normal" };
    // textLength pins the rendered width to the layout's measurement.
    writeln!(
        out,
        r#"<text x="{:.3}" y="{:.3}" font-size="{:.3}" font-weight="{weight}" font-style="{style}" fill="{}" text-anchor="{anchor}" textLength="{:.3}" lengthAdjust="spacingAndGlyphs">{}</text>"#,
        run.anchor_x * unit,
        run.baseline() * unit,
        run.size * unit,
        run.color,
        run.width * unit,
        escape_xml(&run.text)
    )?;
    Ok(())
}

fn write_barcode(out: &mut String, slot: &BarcodeSlot, unit: f64) -> Result<(), RenderError> {
    let x = slot.rect.x * unit;
    let y = slot.rect.y * unit;
    let w = slot.rect.width * unit;
    let h = slot.rect.height * unit;
    match &slot.fill {
        BarcodeFill::Bars { bitmap, .. } => {
            writeln!(
                out,
                r##"<rect x="{x:.3}" y="{y:.3}" width="{w:.3}" height="{h:.3}" fill="#ffffff"/>"##
            )?;
            let module = w / bitmap.module_count() as f64;
            for (start, len) in bitmap.bars() {
                writeln!(
                    out,
                    r##"<rect x="{:.4}" y="{y:.3}" width="{:.4}" height="{h:.3}" fill="#000000"/>"##,
                    x + start as f64 * module,
                    len as f64 * module
                )?;
            }
        }
        BarcodeFill::Placeholder { reason } => {
            let stroke = unit * 0.0025;
            writeln!(
                out,
                r#"<rect x="{x:.3}" y="{y:.3}" width="{w:.3}" height="{h:.3}" fill="none" stroke="{PLACEHOLDER_STROKE}" stroke-width="{stroke:.3}" stroke-dasharray="{:.3}"><title>{}</title></rect>"#,
                stroke * 3.0,
                escape_xml(&reason.to_string())
            )?;
        }
    }
    Ok(())
}

fn write_ring(out: &mut String, ring: &GuideRing, unit: f64) -> Result<(), RenderError> {
    let c = unit / 2.0;
    writeln!(
        out,
        r#"<circle cx="{c:.3}" cy="{c:.3}" r="{:.3}" fill="none" stroke="{}" stroke-width="{:.3}" stroke-dasharray="{:.3}"/>"#,
        ring.radius() * unit,
        ring.color,
        ring.stroke * unit,
        ring.dash * unit
    )?;
    Ok(())
}
