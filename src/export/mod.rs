//! PDF serialisation and the export state machine.

pub mod coordinator;
pub mod pdf;

pub use coordinator::{ExportCoordinator, ExportTarget, Outcome, Stage};
pub use pdf::{PdfExporter, PdfFile};
