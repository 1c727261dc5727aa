//! Single-page A4 PDF carrying the captured disc at its physical size.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbaImage;
use log::{debug, info};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};
use sha2::{Digest, Sha256};

use crate::core::layout::DISC_DIAMETER_MM;
use crate::error::SerializeError;

pub const PT_PER_MM: f64 = 72.0 / 25.4;
pub const A4_WIDTH_MM: f64 = 210.0;
pub const A4_HEIGHT_MM: f64 = 297.0;
/// Extra radius of the dashed guide ring beyond the disc edge.
pub const GUIDE_RING_MARGIN_MM: f64 = 1.5;
pub const GUIDE_RING_STROKE_PT: f64 = 0.3;
pub const CALIBRATION_BAR_MM: f64 = 50.0;
pub const SCALE_CAPTION: &str = "Print at 100% scale (disable \"fit to page\"). Disc diameter 90 mm.";
const CUT_CAPTION: &str = "Cut along the solid outline. The dashed ring is a size guide only.";

/// Bezier control distance for a quarter circle of radius 1.
const KAPPA: f64 = 0.552_284_75;

/// Serialized export artifact.
#[derive(Debug, Clone)]
pub struct PdfFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Width the disc image occupies on the page, converted back to mm.
    pub placed_diameter_mm: f64,
}

impl PdfFile {
    /// Write into `dir` via a temporary name so a failed write leaves no file behind.
    pub async fn write_into(&self, dir: &Path) -> Result<PathBuf, SerializeError> {
        let target = dir.join(&self.file_name);
        let partial = dir.join(format!(".{}.partial", self.file_name));
        if let Err(source) = tokio::fs::write(&partial, &self.bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(SerializeError::Io {
                path: target,
                source,
            });
        }
        tokio::fs::rename(&partial, &target)
            .await
            .map_err(|source| SerializeError::Io {
                path: target.clone(),
                source,
            })?;
        info!("wrote {} ({} bytes)", target.display(), self.bytes.len());
        Ok(target)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PdfExporter {
    title: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl PdfExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Pin the creation date, e.g. for reproducible output.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Place the square disc capture at [`DISC_DIAMETER_MM`] in the centre of an A4 page.
    pub fn export_pdf(&self, raster: &RgbaImage, file_name: &str) -> Result<PdfFile, SerializeError> {
        let (px_w, px_h) = raster.dimensions();
        let rgb = flatten_onto_white(raster);
        let digest = Sha256::digest(&rgb);
        let image_data = deflate(&rgb)?;
        debug!(
            "embedding {px_w}x{px_h} capture ({} bytes deflated)",
            image_data.len()
        );

        let page_w = A4_WIDTH_MM * PT_PER_MM;
        let page_h = A4_HEIGHT_MM * PT_PER_MM;
        let disc_pt = DISC_DIAMETER_MM * PT_PER_MM;
        let (cx, cy) = (page_w / 2.0, page_h / 2.0);

        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px_w as i64,
                "Height" => px_h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            image_data,
        ));
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Disc" => image_id },
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut ops = Vec::new();
        // Disc image, scaled to its physical diameter.
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                pt(disc_pt),
                pt(0.0),
                pt(0.0),
                pt(disc_pt),
                pt(cx - disc_pt / 2.0),
                pt(cy - disc_pt / 2.0),
            ],
        ));
        ops.push(Operation::new("Do", vec!["Disc".into()]));
        ops.push(Operation::new("Q", vec![]));

        let ring_r = (DISC_DIAMETER_MM / 2.0 + GUIDE_RING_MARGIN_MM) * PT_PER_MM;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("w", vec![pt(GUIDE_RING_STROKE_PT)]));
        ops.push(Operation::new("G", vec![pt(0.45)]));
        ops.push(Operation::new(
            "d",
            vec![Object::Array(vec![pt(3.0), pt(2.0)]), 0.into()],
        ));
        circle_path(&mut ops, cx, cy, ring_r);
        ops.push(Operation::new("S", vec![]));
        ops.push(Operation::new("Q", vec![]));

        let top_caption_y = cy + ring_r + 8.0 * PT_PER_MM;
        let scale_caption_y = cy - ring_r - 10.0 * PT_PER_MM;
        caption(&mut ops, CUT_CAPTION, cx, top_caption_y, 9.0);
        caption(&mut ops, SCALE_CAPTION, cx, scale_caption_y, 10.0);
        calibration_bar(&mut ops, cx, scale_caption_y - 14.0 * PT_PER_MM);

        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![pt(0.0), pt(0.0), pt(page_w), pt(page_h)],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });

        let created = self.timestamp.unwrap_or_else(Utc::now);
        let title = self
            .title
            .clone()
            .unwrap_or_else(|| file_name.trim_end_matches(".pdf").to_string());
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal(concat!("permit-disc ", env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Object::string_literal(created.format("D:%Y%m%d%H%M%SZ").to_string()),
        });
        let id = Object::String(digest[..16].to_vec(), StringFormat::Hexadecimal);

        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.trailer.set("ID", vec![id.clone(), id]);

        let mut bytes = Vec::new();
        save_document(&mut doc, &mut bytes)?;

        Ok(PdfFile {
            file_name: file_name.to_string(),
            bytes,
            placed_diameter_mm: disc_pt / PT_PER_MM,
        })
    }
}

fn save_document<W: Write>(doc: &mut Document, target: &mut W) -> Result<(), SerializeError> {
    doc.save_to(target).map_err(SerializeError::Write)
}

fn pt(value: f64) -> Object {
    (value as f32).into()
}

/// RGB bytes of `raster`, composited onto white where it is not opaque.
fn flatten_onto_white(raster: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(raster.width() as usize * raster.height() as usize * 3);
    for px in raster.pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as u16;
        for channel in [r, g, b] {
            let value = (channel as u16 * alpha + 255 * (255 - alpha)) / 255;
            rgb.push(value as u8);
        }
    }
    rgb
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, SerializeError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(SerializeError::Compress)?;
    encoder.finish().map_err(SerializeError::Compress)
}

fn circle_path(ops: &mut Vec<Operation>, cx: f64, cy: f64, r: f64) {
    let k = KAPPA * r;
    ops.push(Operation::new("m", vec![pt(cx + r), pt(cy)]));
    let quarters = [
        [cx + r, cy + k, cx + k, cy + r, cx, cy + r],
        [cx - k, cy + r, cx - r, cy + k, cx - r, cy],
        [cx - r, cy - k, cx - k, cy - r, cx, cy - r],
        [cx + k, cy - r, cx + r, cy - k, cx + r, cy],
    ];
    for quarter in quarters {
        ops.push(Operation::new("c", quarter.iter().map(|v| pt(*v)).collect()));
    }
}

/// Centred Helvetica line; width estimated from Helvetica's average advance.
fn caption(ops: &mut Vec<Operation>, text: &str, cx: f64, y: f64, size: f64) {
    let width = text.chars().count() as f64 * size * 0.5;
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec!["F1".into(), pt(size)]));
    ops.push(Operation::new("g", vec![pt(0.2)]));
    ops.push(Operation::new("Td", vec![pt(cx - width / 2.0), pt(y)]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(text)]));
    ops.push(Operation::new("ET", vec![]));
}

/// A ruler of [`CALIBRATION_BAR_MM`] with end ticks, centred on `cx`.
fn calibration_bar(ops: &mut Vec<Operation>, cx: f64, y: f64) {
    let half = CALIBRATION_BAR_MM / 2.0 * PT_PER_MM;
    let tick = 2.0 * PT_PER_MM;
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("w", vec![pt(0.6)]));
    ops.push(Operation::new("G", vec![pt(0.0)]));
    ops.push(Operation::new("m", vec![pt(cx - half), pt(y)]));
    ops.push(Operation::new("l", vec![pt(cx + half), pt(y)]));
    for x in [cx - half, cx + half] {
        ops.push(Operation::new("m", vec![pt(x), pt(y - tick)]));
        ops.push(Operation::new("l", vec![pt(x), pt(y + tick)]));
    }
    ops.push(Operation::new("S", vec![]));
    ops.push(Operation::new("Q", vec![]));
    caption(
        ops,
        "50 mm - measure this bar to confirm the printer did not rescale",
        cx,
        y - 6.0 * PT_PER_MM,
        8.0,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn raster() -> RgbaImage {
        RgbaImage::from_pixel(64, 64, Rgba([200, 30, 30, 255]))
    }

    fn placed_width_mm(bytes: &[u8]) -> f64 {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let cm = content
            .operations
            .iter()
            .find(|op| op.operator == "cm")
            .unwrap();
        cm.operands[0].as_float().unwrap() as f64 / PT_PER_MM
    }

    #[test]
    fn disc_is_placed_at_ninety_millimetres() {
        let file = PdfExporter::new()
            .export_pdf(&raster(), "Taxi_Permit_ND_123-456.pdf")
            .unwrap();
        assert!((file.placed_diameter_mm - DISC_DIAMETER_MM).abs() < 1e-9);
        assert!((placed_width_mm(&file.bytes) - DISC_DIAMETER_MM).abs() < 0.5);
    }

    #[test]
    fn page_is_a4_with_captions() {
        let file = PdfExporter::new().export_pdf(&raster(), "x.pdf").unwrap();
        let doc = Document::load_mem(&file.bytes).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let media = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert!((media[2].as_float().unwrap() - 595.28).abs() < 0.1);
        assert!((media[3].as_float().unwrap() - 841.89).abs() < 0.1);

        let content = doc.get_page_content(page_id).unwrap();
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("Print at 100% scale"));
        assert!(text.contains("50 mm"));
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn save_failure_keeps_the_io_source() {
        let mut doc = Document::with_version("1.7");
        let err = save_document(&mut doc, &mut BrokenSink).unwrap_err();
        match err {
            SerializeError::Write(source) => {
                assert_eq!(source.kind(), std::io::ErrorKind::StorageFull)
            }
            other => panic!("expected a write error, got {other:?}"),
        }
    }

    #[test]
    fn translucent_pixels_are_flattened_onto_white() {
        let raster = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        assert_eq!(flatten_onto_white(&raster), vec![255, 255, 255]);
    }
}
