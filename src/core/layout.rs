//! Target-independent disc layout.
//!
//! Every coordinate is a fraction of the disc diameter with the origin at the
//! top-left of the disc's bounding square, so the disc centre sits at
//! `(0.5, 0.5)` with radius `0.5`. Renderers multiply by their own unit.

use log::{debug, error, warn};
use serde::Serialize;

use crate::core::barcode::{BarcodeBitmap, Code128, EncodeError, Symbology, normalize_payload};
use crate::core::contrast::{MIN_CONTRAST_RATIO, required_overlay_alpha};
use crate::core::permit::{Color, DiscStyle, FontClass, ImageSource, PermitRecord, TextEmphasis};
use crate::core::typeface::{CAP_HEIGHT_EM, FaceMetrics, LINE_HEIGHT_EM, fit_text};
use crate::error::LayoutOverflowError;

/// Physical diameter of the printed disc. Every target derives its unit from it.
pub const DISC_DIAMETER_MM: f64 = 90.0;

pub const INK: Color = Color::rgb(0x0f, 0x17, 0x2a);
pub const LABEL_INK: Color = Color::rgb(0x33, 0x41, 0x55);
pub const ALERT_INK: Color = Color::rgb(0x99, 0x1b, 0x1b);
const RING_INK: Color = Color::rgb(0xcb, 0xd5, 0xe1);

const HEADER_BAND: Band = Band::new(0.085, 0.205);
const ASSOCIATION_BAND: Band = Band::new(0.215, 0.330);
const REGISTRATION_BAND: Band = Band::new(0.335, 0.525);
const DETAIL_BAND: Band = Band::new(0.535, 0.705);
const BARCODE_BAND: Band = Band::new(0.715, 0.865);

/// Horizontal breathing room kept between text and the rim, per side.
const SIDE_MARGIN: f64 = 0.04;
const CELL_GAP: f64 = 0.03;
const OUTLINE_WIDTH: f64 = 0.0048;
const RING_INSET: f64 = 0.0075;
const RING_STROKE: f64 = 0.0014;
const RING_DASH: f64 = 0.012;

const BARCODE_HEIGHT: f64 = 0.11;
const BARCODE_DEFAULT_WIDTH: f64 = 0.50;
const BARCODE_RIM_MARGIN: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Header,
    Association,
    Registration,
    DetailRow,
    Barcode,
    GuideRing,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Header => "header",
            Role::Association => "association",
            Role::Registration => "registration",
            Role::DetailRow => "detailRow",
            Role::Barcode => "barcode",
            Role::GuideRing => "guideRing",
        }
    }
}

/// Vertical band `[top, bottom)` reserved for one role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    pub top: f64,
    pub bottom: f64,
}

impl Band {
    pub const fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn overlaps(&self, other: &Band) -> bool {
        self.top < other.bottom && other.top < self.bottom
    }

    pub fn contains(&self, rect: &Rect) -> bool {
        const EPS: f64 = 1e-9;
        rect.y >= self.top - EPS && rect.bottom() <= self.bottom + EPS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// All four corners lie within the disc.
    pub fn inside_disc(&self) -> bool {
        const EPS: f64 = 1e-9;
        [
            (self.x, self.y),
            (self.right(), self.y),
            (self.x, self.bottom()),
            (self.right(), self.bottom()),
        ]
        .iter()
        .all(|(x, y)| (x - 0.5).powi(2) + (y - 0.5).powi(2) <= 0.25 + EPS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TextAlign {
    Start,
    Center,
    End,
}

/// One positioned line of text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    pub text: String,
    /// Left edge for `Start`, centre for `Center`, right edge for `End`.
    pub anchor_x: f64,
    /// Top of the line box.
    pub top: f64,
    pub size: f64,
    pub width: f64,
    pub align: TextAlign,
    pub color: Color,
    pub font: FontClass,
    pub emphasis: TextEmphasis,
    pub truncated: bool,
}

impl TextRun {
    pub fn left(&self) -> f64 {
        match self.align {
            TextAlign::Start => self.anchor_x,
            TextAlign::Center => self.anchor_x - self.width / 2.0,
            TextAlign::End => self.anchor_x - self.width,
        }
    }

    /// Baseline with the cap height centred in the line box.
    pub fn baseline(&self) -> f64 {
        self.top + (LINE_HEIGHT_EM + CAP_HEIGHT_EM) / 2.0 * self.size
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.left(), self.top, self.width, LINE_HEIGHT_EM * self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BarcodeFill {
    Bars {
        bitmap: BarcodeBitmap,
        module_mm: f64,
    },
    /// Encoding failed; the slot stays reserved and is drawn as an empty frame.
    Placeholder { reason: EncodeError },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarcodeSlot {
    pub rect: Rect,
    pub fill: BarcodeFill,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuideRing {
    pub inset: f64,
    pub stroke: f64,
    pub dash: f64,
    pub color: Color,
}

impl GuideRing {
    pub fn radius(&self) -> f64 {
        0.5 - self.inset
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ElementContent {
    Text(Vec<TextRun>),
    Barcode(BarcodeSlot),
    Ring(GuideRing),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscElement {
    pub role: Role,
    /// Reserved vertical band; `None` for decorations spanning the whole disc.
    pub band: Option<Band>,
    pub bounds: Rect,
    pub content: ElementContent,
}

/// Semi-opaque veil painted between the background and the text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Overlay {
    pub color: Color,
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Backdrop {
    pub tint: Color,
    pub image: Option<ImageSource>,
    pub overlay: Option<Overlay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Outline {
    pub width: f64,
    pub color: Color,
}

/// Fully resolved disc description, independent of any render target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscLayout {
    pub font: FontClass,
    pub scale: f64,
    pub payload: String,
    pub backdrop: Backdrop,
    pub outline: Outline,
    pub elements: Vec<DiscElement>,
}

impl DiscLayout {
    pub fn element(&self, role: Role) -> Option<&DiscElement> {
        self.elements.iter().find(|el| el.role == role)
    }

    pub fn barcode(&self) -> Option<&BarcodeSlot> {
        self.elements.iter().find_map(|el| match &el.content {
            ElementContent::Barcode(slot) => Some(slot),
            _ => None,
        })
    }

    pub fn text_runs(&self, role: Role) -> &[TextRun] {
        match self.element(role).map(|el| &el.content) {
            Some(ElementContent::Text(runs)) => runs,
            _ => &[],
        }
    }

    /// The barcode could not be encoded and is shown as a placeholder.
    pub fn degraded(&self) -> Option<&EncodeError> {
        match self.barcode().map(|slot| &slot.fill) {
            Some(BarcodeFill::Placeholder { reason }) => Some(reason),
            _ => None,
        }
    }

    /// Check the non-overlap and containment invariants.
    pub fn validate(&self) -> Result<(), LayoutOverflowError> {
        for (idx, a) in self.elements.iter().enumerate() {
            for b in &self.elements[idx + 1..] {
                if let (Some(band_a), Some(band_b)) = (a.band, b.band) {
                    if band_a.overlaps(&band_b) {
                        return Err(LayoutOverflowError::BandOverlap {
                            first: a.role.name(),
                            second: b.role.name(),
                        });
                    }
                }
            }
            if let Some(band) = a.band {
                if !band.contains(&a.bounds) {
                    return Err(LayoutOverflowError::OutOfBand {
                        role: a.role.name(),
                        top: a.bounds.y,
                        bottom: a.bounds.bottom(),
                    });
                }
            }
            let parts: Vec<Rect> = match &a.content {
                ElementContent::Text(runs) => runs.iter().map(TextRun::bounds).collect(),
                ElementContent::Barcode(slot) => vec![slot.rect],
                ElementContent::Ring(_) => Vec::new(),
            };
            if parts.iter().any(|rect| !rect.inside_disc()) {
                return Err(LayoutOverflowError::OutsideDisc {
                    role: a.role.name(),
                });
            }
        }
        Ok(())
    }
}

/// Width of the horizontal chord through the disc that is narrowest over `[top, bottom]`.
pub fn chord_width(top: f64, bottom: f64) -> f64 {
    let dy = (top - 0.5).abs().max((bottom - 0.5).abs());
    2.0 * (0.25 - dy * dy).max(0.0).sqrt()
}

struct Cell {
    text: String,
    align: TextAlign,
    color: Color,
    emphasis: TextEmphasis,
}

impl Cell {
    fn new(text: impl AsRef<str>, align: TextAlign, color: Color, emphasis: TextEmphasis) -> Self {
        Self {
            text: text.as_ref().trim().to_uppercase(),
            align,
            color,
            emphasis,
        }
    }

    fn centered(text: impl AsRef<str>, color: Color, emphasis: TextEmphasis) -> Self {
        Self::new(text, TextAlign::Center, color, emphasis)
    }
}

struct Line {
    /// Base em size as a fraction of the diameter, before scaling.
    base: f64,
    cells: Vec<Cell>,
}

impl Line {
    fn single(base: f64, cell: Cell) -> Self {
        Self {
            base,
            cells: vec![cell],
        }
    }

    fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.text.is_empty())
    }
}

/// Pure `(PermitRecord, DiscStyle) -> DiscLayout` engine.
#[derive(Debug, Default, Clone)]
pub struct DiscLayoutEngine<S: Symbology = Code128> {
    symbology: S,
}

impl DiscLayoutEngine<Code128> {
    pub fn new() -> Self {
        Self { symbology: Code128 }
    }
}

impl<S: Symbology> DiscLayoutEngine<S> {
    pub fn with_symbology(symbology: S) -> Self {
        Self { symbology }
    }

    pub fn symbology(&self) -> &S {
        &self.symbology
    }

    /// Normalize the record's barcode source and encode it.
    pub fn encode(&self, record: &PermitRecord) -> Result<BarcodeBitmap, EncodeError> {
        let payload = normalize_payload(record.barcode_source());
        self.symbology.encode(&payload)
    }

    pub fn compute(&self, record: &PermitRecord, style: &DiscStyle) -> DiscLayout {
        let barcode = self.encode(record);
        self.compute_with_barcode(record, style, barcode)
    }

    /// Lay out the disc around an already attempted barcode encoding.
    pub fn compute_with_barcode(
        &self,
        record: &PermitRecord,
        style: &DiscStyle,
        barcode: Result<BarcodeBitmap, EncodeError>,
    ) -> DiscLayout {
        let scale = style.effective_scale();
        let metrics = FaceMetrics::for_class(style.font_class);
        let payload = normalize_payload(record.barcode_source());

        let header = vec![
            Line::single(
                0.026,
                Cell::centered(&record.authority_name, INK, style.authority_emphasis),
            ),
            Line::single(
                0.036,
                Cell::centered(record.title_line(), INK, TextEmphasis::Bold),
            ),
        ];
        let association = vec![
            Line::single(
                0.043,
                Cell::centered(&record.association_name, INK, TextEmphasis::Bold),
            ),
            Line::single(
                0.021,
                Cell::centered("Association Permit", LABEL_INK, TextEmphasis::Bold),
            ),
        ];
        let registration = vec![
            Line::single(0.019, Cell::centered("Reg. No:", LABEL_INK, TextEmphasis::Bold)),
            Line::single(
                0.085,
                Cell::centered(&record.registration_number, INK, TextEmphasis::Bold),
            ),
        ];
        let detail = vec![
            Line::single(
                0.031,
                Cell::centered(labelled("Make", &record.vehicle_make), INK, TextEmphasis::Bold),
            ),
            Line::single(
                0.020,
                Cell::centered(labelled("Owner", &record.owner_name), LABEL_INK, TextEmphasis::Normal),
            ),
            Line {
                base: 0.018,
                cells: vec![
                    Cell::new("Issued Date", TextAlign::Start, LABEL_INK, TextEmphasis::Bold),
                    Cell::new("Expiry Date", TextAlign::End, LABEL_INK, TextEmphasis::Bold),
                ],
            },
            Line {
                base: 0.026,
                cells: vec![
                    Cell::new(&record.issued_date, TextAlign::Start, INK, TextEmphasis::Bold),
                    Cell::new(&record.expiry_date, TextAlign::End, ALERT_INK, TextEmphasis::Bold),
                ],
            },
        ];

        let mut elements = vec![
            text_element(Role::Header, HEADER_BAND, header, scale, style.font_class, &metrics),
            text_element(
                Role::Association,
                ASSOCIATION_BAND,
                association,
                scale,
                style.font_class,
                &metrics,
            ),
            text_element(
                Role::Registration,
                REGISTRATION_BAND,
                registration,
                scale,
                style.font_class,
                &metrics,
            ),
            text_element(Role::DetailRow, DETAIL_BAND, detail, scale, style.font_class, &metrics),
        ];
        elements.push(barcode_element(barcode));
        elements.push(guide_ring_element());

        let layout = DiscLayout {
            font: style.font_class,
            scale,
            payload,
            backdrop: backdrop(style),
            outline: Outline {
                width: OUTLINE_WIDTH,
                color: Color::black(),
            },
            elements,
        };

        if let Err(err) = layout.validate() {
            error!("layout invariant violated: {err}");
            debug_assert!(false, "layout invariant violated: {err}");
        }
        layout
    }
}

/// Convenience wrapper using the default Code 128 engine.
pub fn compute_layout(record: &PermitRecord, style: &DiscStyle) -> DiscLayout {
    DiscLayoutEngine::new().compute(record, style)
}

fn labelled(label: &str, value: &str) -> String {
    if value.trim().is_empty() {
        String::new()
    } else {
        format!("{label}: {}", value.trim())
    }
}

fn text_element(
    role: Role,
    band: Band,
    lines: Vec<Line>,
    scale: f64,
    font: FontClass,
    metrics: &FaceMetrics,
) -> DiscElement {
    let lines: Vec<Line> = lines.into_iter().filter(|l| !l.is_blank()).collect();
    let mut sizes: Vec<f64> = lines.iter().map(|l| l.base * scale).collect();

    let stacked: f64 = sizes.iter().map(|s| s * LINE_HEIGHT_EM).sum();
    if stacked > band.height() {
        let factor = band.height() / stacked;
        debug!(
            "{}: clamping type sizes by {:.3} to stay inside its band",
            role.name(),
            factor
        );
        for size in &mut sizes {
            *size *= factor;
        }
    }
    let stacked: f64 = sizes.iter().map(|s| s * LINE_HEIGHT_EM).sum();

    let mut cursor = band.top + (band.height() - stacked) / 2.0;
    let mut runs = Vec::new();
    for (line, size) in lines.iter().zip(&sizes) {
        let line_height = size * LINE_HEIGHT_EM;
        let available = chord_width(cursor, cursor + line_height) - 2.0 * SIDE_MARGIN;
        let half = available / 2.0;
        for cell in &line.cells {
            if cell.text.is_empty() {
                continue;
            }
            let (max_width, anchor_x) = match (cell.align, line.cells.len()) {
                (TextAlign::Center, _) => (available, 0.5),
                (TextAlign::Start, 1) => (available, 0.5 - half),
                (TextAlign::End, 1) => (available, 0.5 + half),
                (TextAlign::Start, _) => (half - CELL_GAP / 2.0, 0.5 - half),
                (TextAlign::End, _) => (half - CELL_GAP / 2.0, 0.5 + half),
            };
            let fitted = fit_text(metrics, &cell.text, *size, max_width, cell.emphasis);
            if fitted.truncated {
                debug!(
                    "{}: truncated '{}' to '{}'",
                    role.name(),
                    cell.text,
                    fitted.text
                );
            } else if fitted.shrunk {
                debug!(
                    "{}: shrunk '{}' to {:.4} of the diameter",
                    role.name(),
                    cell.text,
                    fitted.size
                );
            }
            // Shrunk runs stay vertically centred in their line box.
            let top = cursor + (line_height - fitted.size * LINE_HEIGHT_EM) / 2.0;
            runs.push(TextRun {
                text: fitted.text,
                anchor_x,
                top,
                size: fitted.size,
                width: fitted.width,
                align: cell.align,
                color: cell.color,
                font,
                emphasis: cell.emphasis,
                truncated: fitted.truncated,
            });
        }
        cursor += line_height;
    }

    let bounds = runs
        .iter()
        .map(TextRun::bounds)
        .reduce(|a, b| a.union(&b))
        .unwrap_or_else(|| Rect::new(0.5, band.top + band.height() / 2.0, 0.0, 0.0));

    DiscElement {
        role,
        band: Some(band),
        bounds,
        content: ElementContent::Text(runs),
    }
}

fn barcode_element(barcode: Result<BarcodeBitmap, EncodeError>) -> DiscElement {
    let top = BARCODE_BAND.top + (BARCODE_BAND.height() - BARCODE_HEIGHT) / 2.0;
    let max_width = chord_width(top, top + BARCODE_HEIGHT) - 2.0 * BARCODE_RIM_MARGIN;

    let (width, fill) = match barcode {
        Ok(bitmap) => {
            let default_mm = BARCODE_DEFAULT_WIDTH * DISC_DIAMETER_MM;
            match bitmap.fit(default_mm) {
                Ok(module_mm) => (BARCODE_DEFAULT_WIDTH, BarcodeFill::Bars { bitmap, module_mm }),
                Err(narrow) => {
                    let widened = narrow.required_mm / DISC_DIAMETER_MM;
                    if widened <= max_width {
                        debug!(
                            "barcode: widening slot from {:.1} mm to {:.1} mm for scannable modules",
                            narrow.slot_mm, narrow.required_mm
                        );
                        let module_mm = bitmap.module_width_mm(narrow.required_mm);
                        (widened, BarcodeFill::Bars { bitmap, module_mm })
                    } else {
                        let reason = EncodeError::Unscannable {
                            required_mm: narrow.required_mm,
                            available_mm: max_width * DISC_DIAMETER_MM,
                        };
                        warn!("barcode: {reason}; drawing placeholder");
                        (BARCODE_DEFAULT_WIDTH, BarcodeFill::Placeholder { reason })
                    }
                }
            }
        }
        Err(reason) => {
            warn!("barcode: {reason}; drawing placeholder");
            (BARCODE_DEFAULT_WIDTH, BarcodeFill::Placeholder { reason })
        }
    };

    let rect = Rect::new(0.5 - width / 2.0, top, width, BARCODE_HEIGHT);
    DiscElement {
        role: Role::Barcode,
        band: Some(BARCODE_BAND),
        bounds: rect,
        content: ElementContent::Barcode(BarcodeSlot { rect, fill }),
    }
}

fn guide_ring_element() -> DiscElement {
    let ring = GuideRing {
        inset: RING_INSET,
        stroke: RING_STROKE,
        dash: RING_DASH,
        color: RING_INK,
    };
    DiscElement {
        role: Role::GuideRing,
        band: None,
        bounds: Rect::new(RING_INSET, RING_INSET, 1.0 - 2.0 * RING_INSET, 1.0 - 2.0 * RING_INSET),
        content: ElementContent::Ring(ring),
    }
}

fn backdrop(style: &DiscStyle) -> Backdrop {
    let texts = [INK, LABEL_INK, ALERT_INK];
    // A photo may be arbitrarily dark, so the veil is sized for pure black.
    let darkest = if style.background_image.is_some() {
        Color::black()
    } else {
        style.background_color
    };
    let alpha = required_overlay_alpha(darkest, Color::white(), &texts, MIN_CONTRAST_RATIO);
    Backdrop {
        tint: style.background_color,
        image: style.background_image.clone(),
        overlay: (alpha > 0.0).then_some(Overlay {
            color: Color::white(),
            alpha,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contrast::contrast_ratio;
    use crate::core::typeface::ELLIPSIS;
    use pretty_assertions::assert_eq;

    fn record() -> PermitRecord {
        PermitRecord {
            registration_number: "ND 123-456".into(),
            owner_name: "Sipho Dlamini".into(),
            vehicle_make: "Toyota Quantum".into(),
            association_name: "Umzimkhulu Taxi".into(),
            issued_date: "01 Jan 2024".into(),
            expiry_date: "31 Dec 2024".into(),
            permit_title: "Rank Permit".into(),
            authority_name: "Safety and Security".into(),
            identifier: String::new(),
            year: Some(2024),
        }
    }

    #[test]
    fn layout_is_deterministic() {
        let style = DiscStyle::default();
        assert_eq!(compute_layout(&record(), &style), compute_layout(&record(), &style));
    }

    #[test]
    fn roles_come_in_fixed_order() {
        let layout = compute_layout(&record(), &DiscStyle::default());
        let roles: Vec<Role> = layout.elements.iter().map(|e| e.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::Header,
                Role::Association,
                Role::Registration,
                Role::DetailRow,
                Role::Barcode,
                Role::GuideRing
            ]
        );
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn registration_is_the_largest_text() {
        let layout = compute_layout(&record(), &DiscStyle::default());
        let reg = layout
            .text_runs(Role::Registration)
            .iter()
            .map(|r| r.size)
            .fold(0.0, f64::max);
        for role in [Role::Header, Role::Association, Role::DetailRow] {
            for run in layout.text_runs(role) {
                assert!(run.size < reg, "{:?} run '{}' outgrows registration", role, run.text);
            }
        }
    }

    #[test]
    fn sizes_follow_global_scale() {
        let mut style = DiscStyle::default();
        let base = compute_layout(&record(), &style);
        style.global_scale = 1.2;
        let scaled = compute_layout(&record(), &style);
        let a = &base.text_runs(Role::Header)[0];
        let b = &scaled.text_runs(Role::Header)[0];
        assert!((b.size / a.size - 1.2).abs() < 1e-9);
    }

    #[test]
    fn long_association_is_truncated_registration_kept() {
        let mut rec = record();
        rec.association_name = "Greater Umzimkhulu Long Distance Taxi Co".into();
        assert_eq!(rec.association_name.chars().count(), 40);
        let style = DiscStyle {
            global_scale: 1.5,
            ..DiscStyle::default()
        };
        let layout = compute_layout(&rec, &style);
        let assoc = &layout.text_runs(Role::Association)[0];
        assert!(assoc.truncated);
        assert!(assoc.text.ends_with(ELLIPSIS));

        let reg = &layout.text_runs(Role::Registration)[1];
        assert_eq!(reg.text, "ND 123-456");
        assert!(!reg.truncated);
        assert!((reg.size - 0.085 * 1.5).abs() < 1e-9);
        assert!((reg.anchor_x - 0.5).abs() < 1e-12);
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn encode_failure_keeps_every_other_element() {
        let mut rec = record();
        rec.registration_number = "   ".into();
        let layout = compute_layout(&rec, &DiscStyle::default());
        assert_eq!(layout.degraded(), Some(&EncodeError::Empty));
        assert!(layout.barcode().is_some());
        for role in [Role::Header, Role::Association, Role::DetailRow] {
            assert!(!layout.text_runs(role).is_empty());
        }
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn long_payload_widens_slot_then_degrades() {
        let mut rec = record();
        rec.identifier = "ABCDEFGHJKLMNP".into();
        let layout = compute_layout(&rec, &DiscStyle::default());
        let slot = layout.barcode().unwrap();
        assert!(slot.rect.width > BARCODE_DEFAULT_WIDTH);
        match &slot.fill {
            BarcodeFill::Bars { module_mm, .. } => assert!(*module_mm >= 0.25 - 1e-9),
            other => panic!("expected bars, got {other:?}"),
        }

        rec.identifier = "ABCDEFGHJKLMNPQRSTUVWXYZ".into();
        let layout = compute_layout(&rec, &DiscStyle::default());
        assert!(matches!(
            layout.degraded(),
            Some(EncodeError::Unscannable { .. })
        ));
    }

    #[test]
    fn photo_background_gets_contrast_veil() {
        let style = DiscStyle {
            background_image: Some(ImageSource::from("https://example.org/rank.jpg")),
            ..DiscStyle::default()
        };
        let layout = compute_layout(&record(), &style);
        let overlay = layout.backdrop.overlay.expect("veil over photos");
        let worst = Color::black().blend(overlay.color, overlay.alpha);
        for ink in [INK, LABEL_INK, ALERT_INK] {
            assert!(contrast_ratio(ink, worst) >= MIN_CONTRAST_RATIO);
        }
    }

    #[test]
    fn chord_is_full_width_at_centre() {
        assert!((chord_width(0.5, 0.5) - 1.0).abs() < 1e-12);
        assert_eq!(chord_width(0.0, 0.0), 0.0);
    }
}
