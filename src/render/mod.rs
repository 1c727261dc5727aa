//! Render targets for a [`DiscLayout`].
//!
//! Every target maps layout fractions to its own unit (CSS px, mm, device
//! px) and reports where it actually put each element, so proportions can be
//! compared across targets.

mod print;
mod svg;

use image::{DynamicImage, RgbaImage};
use serde::Serialize;

use crate::core::layout::{DISC_DIAMETER_MM, DiscLayout, Rect, Role};
use crate::error::ExportError;
use crate::image::paint::{capture_disc, capture_dpi, capture_side_px};

pub use print::{CommandPrintHost, DryRunPrintHost, PrintHost, render_print_document};
pub use svg::render_preview_svg;

/// Where a layout is realised.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RenderTarget {
    /// Interactive preview in a square container `container_px` CSS px wide.
    Preview { container_px: f64 },
    /// Physical-unit document handed to the host print facility.
    Print,
    /// Offscreen opaque raster for PDF embedding.
    Capture { dpi: u32 },
}

impl RenderTarget {
    /// Disc diameter expressed in the target's unit.
    pub fn diameter(&self) -> f64 {
        match self {
            RenderTarget::Preview { container_px } => *container_px,
            RenderTarget::Print => DISC_DIAMETER_MM,
            RenderTarget::Capture { dpi } => capture_side_px(*dpi) as f64,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            RenderTarget::Preview { .. } => "px",
            RenderTarget::Print => "mm",
            RenderTarget::Capture { .. } => "device px",
        }
    }
}

/// Where one element ended up on a surface, in target units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElementPlacement {
    pub role: Role,
    pub center: (f64, f64),
    pub extent: (f64, f64),
    pub diameter: f64,
}

impl ElementPlacement {
    pub(crate) fn from_rect(role: Role, rect: &Rect, diameter: f64) -> Self {
        let (cx, cy) = rect.center();
        Self {
            role,
            center: (cx * diameter, cy * diameter),
            extent: (rect.width * diameter, rect.height * diameter),
            diameter,
        }
    }

    /// Centre as a fraction of the disc diameter.
    pub fn relative_center(&self) -> (f64, f64) {
        (self.center.0 / self.diameter, self.center.1 / self.diameter)
    }

    pub fn relative_extent(&self) -> (f64, f64) {
        (self.extent.0 / self.diameter, self.extent.1 / self.diameter)
    }
}

#[derive(Debug, Clone)]
pub enum SurfaceContent {
    Svg(String),
    Html(String),
    Raster(RgbaImage),
}

#[derive(Debug, Clone)]
pub struct RenderedSurface {
    pub target: RenderTarget,
    pub placements: Vec<ElementPlacement>,
    pub content: SurfaceContent,
}

impl RenderedSurface {
    pub fn placement(&self, role: Role) -> Option<&ElementPlacement> {
        self.placements.iter().find(|p| p.role == role)
    }

    pub fn raster(&self) -> Option<&RgbaImage> {
        match &self.content {
            SurfaceContent::Raster(image) => Some(image),
            _ => None,
        }
    }

    pub fn markup(&self) -> Option<&str> {
        match &self.content {
            SurfaceContent::Svg(text) | SurfaceContent::Html(text) => Some(text),
            SurfaceContent::Raster(_) => None,
        }
    }
}

/// Realises layouts on any target. The decoded background photo, if any, is
/// only needed by the Capture target; vector targets reference it by URL.
#[derive(Debug, Default, Clone)]
pub struct DiscRenderer {
    background: Option<DynamicImage>,
}

impl DiscRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_background(background: Option<DynamicImage>) -> Self {
        Self { background }
    }

    pub fn render(
        &self,
        layout: &DiscLayout,
        target: RenderTarget,
    ) -> Result<RenderedSurface, ExportError> {
        match target {
            RenderTarget::Preview { container_px } => {
                let (svg, placements) = render_preview_svg(layout, container_px)?;
                Ok(RenderedSurface {
                    target,
                    placements,
                    content: SurfaceContent::Svg(svg),
                })
            }
            RenderTarget::Print => {
                let (html, placements) = render_print_document(layout)?;
                Ok(RenderedSurface {
                    target,
                    placements,
                    content: SurfaceContent::Html(html),
                })
            }
            RenderTarget::Capture { dpi } => {
                let (raster, placements) = capture_disc(layout, dpi, self.background.as_ref())?;
                Ok(RenderedSurface {
                    target: RenderTarget::Capture {
                        dpi: capture_dpi(layout, dpi),
                    },
                    placements,
                    content: SurfaceContent::Raster(raster),
                })
            }
        }
    }
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::compute_layout;
    use crate::core::permit::{DiscStyle, PermitRecord};

    fn layout() -> DiscLayout {
        let record = PermitRecord {
            registration_number: "ND 123-456".into(),
            owner_name: "Thandi Nkosi".into(),
            vehicle_make: "Toyota".into(),
            association_name: "Ilembe Taxi".into(),
            issued_date: "01/02/2024".into(),
            expiry_date: "31/01/2025".into(),
            permit_title: "Operating Permit".into(),
            authority_name: "KwaDukuza Municipality".into(),
            identifier: String::new(),
            year: None,
        };
        compute_layout(&record, &DiscStyle::default())
    }

    #[test]
    fn targets_agree_on_relative_geometry() {
        let layout = layout();
        let renderer = DiscRenderer::new();
        let surfaces: Vec<RenderedSurface> = [
            RenderTarget::Preview { container_px: 340.0 },
            RenderTarget::Print,
            RenderTarget::Capture { dpi: 300 },
        ]
        .into_iter()
        .map(|target| renderer.render(&layout, target).unwrap())
        .collect();

        for el in &layout.elements {
            let reference = surfaces[0].placement(el.role).unwrap().relative_center();
            for surface in &surfaces[1..] {
                let other = surface.placement(el.role).unwrap().relative_center();
                assert!(
                    (reference.0 - other.0).abs() < 2e-3 && (reference.1 - other.1).abs() < 2e-3,
                    "{:?} differs on {:?}: {:?} vs {:?}",
                    el.role,
                    surface.target,
                    reference,
                    other
                );
            }
        }
    }

    #[test]
    fn capture_is_fully_opaque() {
        let layout = layout();
        let surface = DiscRenderer::new()
            .render(&layout, RenderTarget::Capture { dpi: 150 })
            .unwrap();
        let raster = surface.raster().unwrap();
        assert_eq!(raster.width(), capture_side_px(capture_dpi(&layout, 150)));
        assert_eq!(surface.target.diameter(), raster.width() as f64);
        assert!(raster.pixels().all(|px| px.0[3] == 255));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("A&B <C>"), "A&amp;B &lt;C&gt;");
    }
}
