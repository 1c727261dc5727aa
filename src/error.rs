//! Error taxonomy of the disc pipeline, one enum per stage.

use std::path::PathBuf;

use thiserror::Error;

pub use crate::core::barcode::EncodeError;

/// A laid-out element escaped its reserved band or the disc itself. Always a
/// defect in the layout engine, never a user-facing condition.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutOverflowError {
    #[error("reserved bands of {first} and {second} overlap")]
    BandOverlap {
        first: &'static str,
        second: &'static str,
    },
    #[error("{role} spans {top:.4}..{bottom:.4}, outside its reserved band")]
    OutOfBand {
        role: &'static str,
        top: f64,
        bottom: f64,
    },
    #[error("{role} crosses the rim of the disc")]
    OutsideDisc { role: &'static str },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write rendered markup")]
    Write(#[from] std::fmt::Error),
    #[error("failed to launch print command '{command}'")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to hand the document to '{command}'")]
    Pipe {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("print command '{command}' exited with {status}")]
    Rejected { command: String, status: String },
}

/// Rasterising the Capture surface failed.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("background image {location} is unreachable: {reason}")]
    ImageUnreachable { location: String, reason: String },
    #[error("background image {location} could not be decoded")]
    ImageDecode {
        location: String,
        #[source]
        source: image::ImageError,
    },
    #[error("capture did not finish within {ms} ms")]
    Timeout { ms: u64 },
    #[error("rasterisation failed: {0}")]
    Raster(String),
    #[error("captured barcode does not read back as {payload}: {reason}")]
    BarcodeUnreadable { payload: String, reason: String },
}

/// Building or writing the PDF failed after a successful capture.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to compress the captured raster")]
    Compress(#[source] std::io::Error),
    #[error("failed to assemble PDF document")]
    Pdf(#[from] lopdf::Error),
    #[error("failed to serialise PDF document")]
    Write(#[source] std::io::Error),
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("export task aborted: {0}")]
    Task(String),
}

/// Classified failure of one coordinator run.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ExportError {
    pub fn stage(&self) -> &'static str {
        match self {
            ExportError::Encode(_) => "encode",
            ExportError::Capture(_) => "capture",
            ExportError::Serialize(_) => "serialize",
            ExportError::Render(_) => "render",
        }
    }

    /// What the user can do about it.
    pub fn advice(&self) -> String {
        match self {
            ExportError::Encode(err) => {
                format!("check the registration number or identifier ({err})")
            }
            ExportError::Capture(
                CaptureError::ImageUnreachable { .. }
                | CaptureError::ImageDecode { .. }
                | CaptureError::Timeout { .. },
            ) => "remove or replace the background image, then export again".to_string(),
            ExportError::Capture(CaptureError::BarcodeUnreadable { .. }) => {
                "raise [capture] dpi or shorten the barcode payload, then export again".to_string()
            }
            ExportError::Capture(CaptureError::Raster(_)) => {
                "export again; the preview was left unchanged".to_string()
            }
            ExportError::Serialize(SerializeError::Io { path, .. }) => format!(
                "check that {} is writable, then export again",
                path.parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| ".".to_string())
            ),
            ExportError::Serialize(_) => "export again; no file was written".to_string(),
            ExportError::Render(RenderError::Write(_)) => {
                "render again; the preview was left unchanged".to_string()
            }
            ExportError::Render(_) => {
                "check the print command in the configuration and that the printer is online"
                    .to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_failures_point_at_the_background() {
        let err = ExportError::from(CaptureError::ImageUnreachable {
            location: "https://example.invalid/a.jpg".into(),
            reason: "dns error".into(),
        });
        assert_eq!(err.stage(), "capture");
        assert!(err.advice().contains("background image"));
    }

    #[test]
    fn unreadable_capture_is_a_capture_failure() {
        let err = ExportError::from(CaptureError::BarcodeUnreadable {
            payload: "ND123456".into(),
            reason: "no start symbol".into(),
        });
        assert_eq!(err.stage(), "capture");
        assert!(err.advice().contains("dpi"));
    }

    #[test]
    fn write_failures_name_the_directory() {
        let err = ExportError::from(SerializeError::Io {
            path: PathBuf::from("/nope/Taxi_Permit_X.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        });
        assert!(err.advice().contains("/nope"));
    }
}
