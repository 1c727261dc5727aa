//! Shared clap helper types for CLI commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use permit_disc::{Color, DiscStyle, FontClass, ImageSource, PermitRecord, TextEmphasis};

use crate::cli::utils::read_json;

/// Typeface classes accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FontClassArg {
    Sans,
    Serif,
    Mono,
    Display,
}

impl From<FontClassArg> for FontClass {
    fn from(value: FontClassArg) -> FontClass {
        match value {
            FontClassArg::Sans => FontClass::Sans,
            FontClassArg::Serif => FontClass::Serif,
            FontClassArg::Mono => FontClass::Mono,
            FontClassArg::Display => FontClass::Display,
        }
    }
}

/// Emphasis for the authority line.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum EmphasisArg {
    Normal,
    Italic,
    Bold,
    #[value(name = "bold-italic")]
    BoldItalic,
}

impl From<EmphasisArg> for TextEmphasis {
    fn from(value: EmphasisArg) -> TextEmphasis {
        match value {
            EmphasisArg::Normal => TextEmphasis::Normal,
            EmphasisArg::Italic => TextEmphasis::Italic,
            EmphasisArg::Bold => TextEmphasis::Bold,
            EmphasisArg::BoldItalic => TextEmphasis::BoldItalic,
        }
    }
}

/// Record and style inputs shared by every disc command.
#[derive(Args, Debug)]
pub struct DiscInput {
    /// Permit record as JSON (`-` for stdin).
    pub record: PathBuf,
    /// Disc style as JSON; defaults apply when omitted.
    #[arg(long)]
    pub style: Option<PathBuf>,
    /// Override the global type scale (0.7 to 1.5).
    #[arg(long)]
    pub scale: Option<f64>,
    /// Override the typeface class.
    #[arg(long, value_enum)]
    pub font: Option<FontClassArg>,
    /// Override the authority line emphasis.
    #[arg(long, value_enum)]
    pub authority: Option<EmphasisArg>,
    /// Override the background tint, e.g. `#fef3c7`.
    #[arg(long)]
    pub tint: Option<Color>,
    /// Background photo URL or path; `none` removes it.
    #[arg(long)]
    pub background: Option<String>,
}

impl DiscInput {
    pub fn load(&self) -> Result<(PermitRecord, DiscStyle)> {
        let record: PermitRecord = read_json(&self.record)
            .with_context(|| format!("invalid permit record {}", self.record.display()))?;
        let mut style: DiscStyle = match &self.style {
            Some(path) => read_json(path)
                .with_context(|| format!("invalid disc style {}", path.display()))?,
            None => DiscStyle::default(),
        };
        if let Some(scale) = self.scale {
            style.global_scale = scale;
        }
        if let Some(font) = self.font {
            style.font_class = font.into();
        }
        if let Some(emphasis) = self.authority {
            style.authority_emphasis = emphasis.into();
        }
        if let Some(tint) = self.tint {
            style.background_color = tint;
        }
        match self.background.as_deref() {
            Some("none") => style.background_image = None,
            Some(location) => style.background_image = Some(ImageSource::from(location)),
            None => {}
        }
        if style.effective_scale() != style.global_scale {
            log::warn!(
                "global scale {} is outside the accepted range, using {}",
                style.global_scale,
                style.effective_scale()
            );
        }
        Ok((record, style))
    }
}
