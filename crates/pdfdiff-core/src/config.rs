//! Comparison configuration
//!
//! Loaded from TOML, every field optional:
//!
//! ```toml
//! granularity = "paragraph"
//! worker_count = 8
//!
//! [highlight]
//! insertion = [0.0, 1.0, 0.0]
//! deletion = [1.0, 0.0, 0.0]
//! modified = [1.0, 0.0, 0.0]
//! opacity = 0.4
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DiffError;
use crate::locate::ChangeKind;

/// Unit of comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Whole-page character diff, located by text search
    #[default]
    Char,
    /// Paragraph nearest-match, located by block boxes
    Paragraph,
}

impl FromStr for Granularity {
    type Err = DiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "char" | "character" => Ok(Granularity::Char),
            "paragraph" | "block" => Ok(Granularity::Paragraph),
            other => Err(DiffError::Config(format!(
                "unknown granularity '{}' (expected char or paragraph)",
                other
            ))),
        }
    }
}

/// RGB colour, components in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb(pub f32, pub f32, pub f32);

impl Rgb {
    pub const GREEN: Rgb = Rgb(0.0, 1.0, 0.0);
    pub const RED: Rgb = Rgb(1.0, 0.0, 0.0);

    /// Parse `#RRGGBB` (leading `#` optional)
    pub fn from_hex(color: &str) -> Result<Self, DiffError> {
        let hex = color.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(DiffError::Config(format!("invalid colour '{}'", color)));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map(|v| v as f32 / 255.0)
                .map_err(|_| DiffError::Config(format!("invalid colour '{}'", color)))
        };
        Ok(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn components(&self) -> [f32; 3] {
        [self.0, self.1, self.2]
    }

    fn is_valid(&self) -> bool {
        self.components().iter().all(|c| (0.0..=1.0).contains(c))
    }
}

/// Classification to colour mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightStyle {
    pub insertion: Rgb,
    pub deletion: Rgb,
    pub modified: Rgb,
    /// Highlight opacity (annotation `/CA`)
    pub opacity: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            insertion: Rgb::GREEN,
            deletion: Rgb::RED,
            modified: Rgb::RED,
            opacity: 0.4,
        }
    }
}

impl HighlightStyle {
    pub fn color_for(&self, kind: ChangeKind) -> Rgb {
        match kind {
            ChangeKind::Insertion => self.insertion,
            ChangeKind::Deletion => self.deletion,
            ChangeKind::Modified => self.modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub granularity: Granularity,
    /// Number of pages compared concurrently
    pub worker_count: usize,
    pub highlight: HighlightStyle,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            worker_count: default_worker_count(),
            highlight: HighlightStyle::default(),
        }
    }
}

/// Twice the available parallelism
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(4)
}

impl DiffConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DiffError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DiffError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        content.parse()
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), DiffError> {
        if self.worker_count == 0 {
            return Err(DiffError::Config(
                "worker_count must be a positive integer".into(),
            ));
        }
        let style = &self.highlight;
        for (name, color) in [
            ("insertion", style.insertion),
            ("deletion", style.deletion),
            ("modified", style.modified),
        ] {
            if !color.is_valid() {
                return Err(DiffError::Config(format!(
                    "{} colour components must be within 0..=1",
                    name
                )));
            }
        }
        if !(0.0..=1.0).contains(&style.opacity) {
            return Err(DiffError::Config("opacity must be within 0..=1".into()));
        }
        Ok(())
    }
}

impl FromStr for DiffConfig {
    type Err = DiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: DiffConfig =
            toml::from_str(s).map_err(|e| DiffError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
