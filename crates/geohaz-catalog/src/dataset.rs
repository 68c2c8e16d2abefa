//! Dataset descriptors and palette colors.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ============================================================================
// HexColor
// ============================================================================

/// A validated `#RGB` or `#RRGGBB` color.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexColor(String);

impl HexColor {
    /// Parse a color. Returns `None` unless it is `#` followed by 3 or 6 hex digits.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let digits = s.strip_prefix('#')?;
        if !matches!(digits.len(), 3 | 6) || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(HexColor(s.to_ascii_lowercase()))
    }

    /// The color as written, lower-cased, with the leading `#`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Six hex digits without `#`, expanding the short form.
    pub fn to_rrggbb(&self) -> String {
        let digits = &self.0[1..];
        if digits.len() == 3 {
            digits.chars().flat_map(|c| [c, c]).collect()
        } else {
            digits.to_string()
        }
    }

    /// Red, green and blue components.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let hex = self.to_rrggbb();
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
        (channel(0), channel(2), channel(4))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        HexColor::parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid color '{}' (expected #RGB or #RRGGBB)", s))
        })
    }
}

// ============================================================================
// DatasetDescriptor
// ============================================================================

/// Display and source metadata for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetDescriptor {
    /// Unique, lower-case identifier.
    pub id: String,
    /// Fully qualified remote asset id.
    pub asset_id: String,
    /// Name of the cached image file.
    pub image_filename: String,
    /// Human description.
    pub description: String,
    /// Whether the asset is an image collection to be mosaicked.
    pub mosaic: bool,
    /// Data provider.
    pub source_name: String,
    /// Provider URL.
    pub source_url: String,
    /// Display colors, low to high.
    pub color_palette: Vec<HexColor>,
    /// Suggested threshold for binarizing the dataset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Pixels above this value are masked when the image is built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_max: Option<f64>,
}

/// One entry of the `datasets:` mapping, before validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct DatasetEntry {
    pub asset_id: String,
    pub image_filename: String,
    pub description: String,
    pub mosaic: bool,
    pub source_name: String,
    pub source_url: String,
    pub color_palette: Vec<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub valid_max: Option<f64>,
}
