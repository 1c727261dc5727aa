//! Raster side of the pipeline: the Capture target painter, its bitmap
//! glyphs, and background photo loading.

pub mod glyphs;
pub mod paint;
pub mod source;

pub use paint::{capture_disc, capture_dpi, capture_side_px, read_barcode, verify_capture};
pub use source::load_background;
