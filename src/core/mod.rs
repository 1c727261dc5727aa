//! Pure domain of the permit disc: input model, barcode symbology, contrast
//! math, type metrics and the layout engine. Nothing here performs I/O.

pub mod barcode;
pub mod contrast;
pub mod layout;
pub mod permit;
pub mod scan;
pub mod typeface;

pub use barcode::{BarcodeBitmap, Code128, EncodeError, SlotTooNarrow, Symbology, normalize_payload};
pub use layout::{
    BarcodeFill, BarcodeSlot, DISC_DIAMETER_MM, DiscElement, DiscLayout, DiscLayoutEngine,
    ElementContent, Rect, Role, TextAlign, TextRun, compute_layout,
};
pub use permit::{Color, DiscStyle, FontClass, ImageSource, PermitRecord, TextEmphasis};
pub use scan::{Code128Reader, ScanError};
