//! Console configuration loaded from an optional TOML file.
//!
//! ```toml
//! [capture]
//! dpi = 600
//! timeout_ms = 5000
//!
//! [print]
//! command = "lpr"
//! args = ["-P", "permits"]
//!
//! [export]
//! output_dir = "out"
//! require_barcode = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::layout::DISC_DIAMETER_MM;

pub const MIN_CAPTURE_DPI: u32 = 150;
pub const MAX_CAPTURE_DPI: u32 = 1200;
/// CSS reference density used to size the preview container.
pub const CSS_PX_PER_INCH: f64 = 96.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub capture: CaptureConfig,
    pub preview: PreviewConfig,
    pub print: PrintConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub dpi: u32,
    pub timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            dpi: 400,
            timeout_ms: 10_000,
        }
    }
}

impl CaptureConfig {
    pub fn effective_dpi(&self) -> u32 {
        self.dpi.clamp(MIN_CAPTURE_DPI, MAX_CAPTURE_DPI)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Edge of the square preview container, in CSS px.
    pub container_px: f64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            container_px: DISC_DIAMETER_MM / 25.4 * CSS_PX_PER_INCH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            command: "lp".to_string(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    /// Fail the export instead of writing a disc with a placeholder barcode.
    pub require_barcode: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            require_barcode: false,
        }
    }
}

impl ConsoleConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ConsoleConfig = toml::from_str(content)?;
        if config.capture.dpi != config.capture.effective_dpi() {
            log::warn!(
                "capture dpi {} outside {}..={}, using {}",
                config.capture.dpi,
                MIN_CAPTURE_DPI,
                MAX_CAPTURE_DPI,
                config.capture.effective_dpi()
            );
        }
        if !(config.preview.container_px.is_finite() && config.preview.container_px > 0.0) {
            anyhow::bail!(
                "preview.container_px must be a positive number (got {})",
                config.preview.container_px
            );
        }
        Ok(config)
    }

    /// Load `path` when given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ConsoleConfig::from_toml_str("").unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert_eq!(config.capture.effective_dpi(), 400);
        assert_eq!(config.print.command, "lp");
        assert!((config.preview.container_px - 340.157).abs() < 1e-3);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ConsoleConfig::from_toml_str(
            r#"
            [capture]
            dpi = 5000

            [export]
            require_barcode = true
            "#,
        )
        .unwrap();
        assert_eq!(config.capture.effective_dpi(), MAX_CAPTURE_DPI);
        assert_eq!(config.capture.timeout_ms, 10_000);
        assert!(config.export.require_barcode);
        assert_eq!(config.export.output_dir, PathBuf::from("."));
    }

    #[test]
    fn rejects_non_positive_container() {
        assert!(ConsoleConfig::from_toml_str("[preview]\ncontainer_px = 0.0").is_err());
    }
}
