//! Input model consumed by the disc pipeline: the permit record owned by the
//! registry and the user-editable disc style.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest and highest accepted [`DiscStyle::global_scale`].
pub const MIN_GLOBAL_SCALE: f64 = 0.7;
pub const MAX_GLOBAL_SCALE: f64 = 1.5;

/// Permit data as supplied by the registry. Treated as immutable input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PermitRecord {
    pub registration_number: String,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub vehicle_make: String,
    #[serde(default)]
    pub association_name: String,
    #[serde(default)]
    pub issued_date: String,
    #[serde(default)]
    pub expiry_date: String,
    #[serde(default)]
    pub permit_title: String,
    #[serde(default)]
    pub authority_name: String,
    /// Stable registry id. Takes precedence over the registration number as
    /// barcode payload when non-empty.
    #[serde(default)]
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
}

impl PermitRecord {
    /// Raw text the barcode is derived from, before normalization.
    pub fn barcode_source(&self) -> &str {
        if self.identifier.trim().is_empty() {
            &self.registration_number
        } else {
            &self.identifier
        }
    }

    /// Title line shown under the authority, with the permit year appended
    /// when the title does not already mention it.
    pub fn title_line(&self) -> String {
        match self.year {
            Some(year) if !self.permit_title.contains(&year.to_string()) => {
                format!("{} {}", self.permit_title.trim(), year)
                    .trim()
                    .to_string()
            }
            _ => self.permit_title.trim().to_string(),
        }
    }

    /// Filename used for the exported PDF, derived only from the registration number.
    pub fn export_file_name(&self) -> String {
        let mut stem = String::with_capacity(self.registration_number.len());
        let mut pending_gap = false;
        for ch in self.registration_number.trim().chars() {
            if ch.is_whitespace() {
                pending_gap = true;
                continue;
            }
            if pending_gap {
                stem.push('_');
                pending_gap = false;
            }
            if ch.is_ascii_alphanumeric() || ch == '-' {
                stem.push(ch);
            } else {
                stem.push('_');
            }
        }
        if stem.is_empty() {
            stem.push_str("UNREGISTERED");
        }
        format!("Taxi_Permit_{stem}.pdf")
    }
}

/// Typeface family class selected by the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FontClass {
    #[default]
    Sans,
    Serif,
    Mono,
    Display,
}

impl fmt::Display for FontClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontClass::Sans => write!(f, "sans"),
            FontClass::Serif => write!(f, "serif"),
            FontClass::Mono => write!(f, "mono"),
            FontClass::Display => write!(f, "display"),
        }
    }
}

/// Emphasis applied to a text run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TextEmphasis {
    Normal,
    Italic,
    #[default]
    Bold,
    BoldItalic,
}

impl TextEmphasis {
    pub fn is_bold(self) -> bool {
        matches!(self, TextEmphasis::Bold | TextEmphasis::BoldItalic)
    }

    pub fn is_italic(self) -> bool {
        matches!(self, TextEmphasis::Italic | TextEmphasis::BoldItalic)
    }
}

/// User-editable appearance of the disc.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscStyle {
    #[serde(default)]
    pub font_class: FontClass,
    #[serde(default = "default_scale")]
    pub global_scale: f64,
    #[serde(default = "Color::white")]
    pub background_color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image: Option<ImageSource>,
    #[serde(default)]
    pub authority_emphasis: TextEmphasis,
}

impl Default for DiscStyle {
    fn default() -> Self {
        Self {
            font_class: FontClass::Sans,
            global_scale: default_scale(),
            background_color: Color::white(),
            background_image: None,
            authority_emphasis: TextEmphasis::Bold,
        }
    }
}

impl DiscStyle {
    /// Scale clamped into the accepted domain. Non-finite values fall back to 1.0.
    pub fn effective_scale(&self) -> f64 {
        if self.global_scale.is_finite() {
            self.global_scale.clamp(MIN_GLOBAL_SCALE, MAX_GLOBAL_SCALE)
        } else {
            default_scale()
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("color must be written as #rrggbb or #rgb (got '{0}')")]
    Format(String),
}

/// Opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn white() -> Self {
        Self::rgb(0xff, 0xff, 0xff)
    }

    pub const fn black() -> Self {
        Self::rgb(0x00, 0x00, 0x00)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Source-over blend of `top` with the given opacity onto `self`.
    pub fn blend(self, top: Color, alpha: f64) -> Color {
        let a = alpha.clamp(0.0, 1.0);
        let mix = |under: u8, over: u8| -> u8 {
            (over as f64 * a + under as f64 * (1.0 - a)).round() as u8
        };
        Color::rgb(mix(self.r, top.r), mix(self.g, top.g), mix(self.b, top.b))
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::Format(s.to_string()))?;
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(ColorParseError::Format(s.to_string())),
        };
        let channel = |idx: usize| {
            u8::from_str_radix(&expanded[idx..idx + 2], 16)
                .map_err(|_| ColorParseError::Format(s.to_string()))
        };
        Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> String {
        value.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Where a background photo is loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageSource {
    Remote(String),
    Local(PathBuf),
}

impl ImageSource {
    /// Reference usable from an SVG/HTML document.
    pub fn href(&self) -> String {
        match self {
            ImageSource::Remote(url) => url.clone(),
            ImageSource::Local(path) => format!("file://{}", path.display()),
        }
    }
}

impl From<String> for ImageSource {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ImageSource::Remote(trimmed.to_string())
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            ImageSource::Local(PathBuf::from(path))
        } else {
            ImageSource::Local(PathBuf::from(trimmed))
        }
    }
}

impl From<&str> for ImageSource {
    fn from(value: &str) -> Self {
        ImageSource::from(value.to_string())
    }
}

impl From<ImageSource> for String {
    fn from(value: ImageSource) -> String {
        match value {
            ImageSource::Remote(url) => url,
            ImageSource::Local(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Remote(url) => f.write_str(url),
            ImageSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn style_deserializes_with_defaults() {
        let style: DiscStyle = serde_json::from_str(r#"{"fontClass":"serif"}"#).unwrap();
        assert_eq!(style.font_class, FontClass::Serif);
        assert_eq!(style.global_scale, 1.0);
        assert_eq!(style.background_color, Color::white());
        assert_eq!(style.authority_emphasis, TextEmphasis::Bold);
    }

    #[test]
    fn scale_is_clamped_into_domain() {
        let mut style = DiscStyle::default();
        style.global_scale = 4.0;
        assert_eq!(style.effective_scale(), MAX_GLOBAL_SCALE);
        style.global_scale = 0.1;
        assert_eq!(style.effective_scale(), MIN_GLOBAL_SCALE);
        style.global_scale = f64::NAN;
        assert_eq!(style.effective_scale(), 1.0);
    }

    #[test]
    fn colors_parse_short_and_long_forms() {
        assert_eq!("#fff".parse::<Color>().unwrap(), Color::white());
        assert_eq!("#0f172a".parse::<Color>().unwrap(), Color::rgb(0x0f, 0x17, 0x2a));
        assert!("0f172a".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
    }

    #[test]
    fn image_sources_are_classified() {
        assert_eq!(
            ImageSource::from("https://example.org/a.png"),
            ImageSource::Remote("https://example.org/a.png".into())
        );
        assert_eq!(
            ImageSource::from("file:///tmp/a.png"),
            ImageSource::Local(PathBuf::from("/tmp/a.png"))
        );
    }

    #[test]
    fn identifier_wins_over_registration_for_barcode() {
        let mut record = PermitRecord {
            registration_number: "ND 123-456".into(),
            ..Default::default()
        };
        assert_eq!(record.barcode_source(), "ND 123-456");
        record.identifier = "PRM-0042".into();
        assert_eq!(record.barcode_source(), "PRM-0042");
    }

    #[test]
    fn file_name_is_derived_from_registration() {
        let record = PermitRecord {
            registration_number: " ND  123-456 ".into(),
            ..Default::default()
        };
        assert_eq!(record.export_file_name(), "Taxi_Permit_ND_123-456.pdf");
    }

    #[test]
    fn title_gets_year_once() {
        let mut record = PermitRecord {
            permit_title: "Rank Permit".into(),
            year: Some(2024),
            ..Default::default()
        };
        assert_eq!(record.title_line(), "Rank Permit 2024");
        record.permit_title = "Official Rank Permit 2024".into();
        assert_eq!(record.title_line(), "Official Rank Permit 2024");
    }
}
