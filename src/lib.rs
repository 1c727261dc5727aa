//! Permit disc pipeline: lays out a 90 mm permit disc from a permit record
//! and a user style, renders it for preview, print and capture, and exports
//! a print-ready PDF.

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod image;
pub mod render;

pub use config::ConsoleConfig;
pub use self::core::{
    BarcodeBitmap, Code128, Code128Reader, Color, DISC_DIAMETER_MM, DiscLayout, DiscLayoutEngine,
    DiscStyle, FontClass, ImageSource, PermitRecord, Role, Symbology, TextEmphasis,
    compute_layout, normalize_payload,
};
pub use error::{CaptureError, EncodeError, ExportError, LayoutOverflowError, RenderError, SerializeError};
pub use export::{ExportCoordinator, ExportTarget, Outcome, PdfExporter, PdfFile, Stage};
pub use render::{DiscRenderer, ElementPlacement, RenderTarget, RenderedSurface};
