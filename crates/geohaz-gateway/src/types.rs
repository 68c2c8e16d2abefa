//! Request and response types shared by gateway implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Metadata for a remote asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Full resource name, e.g. `projects/p/assets/a`.
    pub name: String,
    /// Asset id as known to clients.
    #[serde(default)]
    pub id: String,
    /// `IMAGE`, `IMAGE_COLLECTION`, `TABLE`, ...
    #[serde(rename = "type", default)]
    pub asset_type: String,
}

/// A display range for one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRange {
    /// Value mapped to the first palette color.
    pub min: f64,
    /// Value mapped to the last palette color.
    pub max: f64,
}

/// How the service should render an image into tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationOptions {
    /// Display range.
    pub ranges: Vec<DisplayRange>,
    /// Palette as six-digit hex colors without `#`.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub palette_colors: Vec<String>,
}

impl VisualizationOptions {
    /// Options for a single-band image.
    pub fn new(min: f64, max: f64, palette_colors: Vec<String>) -> Self {
        VisualizationOptions {
            ranges: vec![DisplayRange { min, max }],
            palette_colors,
        }
    }
}

/// Where the viewer fetches tiles for a rendered image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSource {
    /// Service-side map resource name.
    pub map_name: String,
    /// URL with `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
}

/// A bearer token for the compute service. `Debug` does not print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token string.
    pub fn new(token: impl Into<String>) -> Self {
        AccessToken(token.into().trim().to_string())
    }

    /// The token itself, for the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Whether the token is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<{} bytes>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new(" ya29.secret \n");
        assert_eq!(token.secret(), "ya29.secret");
        assert!(!format!("{:?}", token).contains("secret"));
    }

    #[test]
    fn test_visualization_options_wire_shape() {
        let vis = VisualizationOptions::new(0.0, 1.0, vec!["ff0000".to_string()]);
        assert_eq!(
            serde_json::to_value(&vis).unwrap(),
            serde_json::json!({"ranges": [{"min": 0.0, "max": 1.0}], "paletteColors": ["ff0000"]})
        );
    }

    #[test]
    fn test_asset_info_type_field() {
        let info: AssetInfo = serde_json::from_str(
            r#"{"name": "projects/p/assets/a", "id": "projects/p/assets/a",
                "type": "IMAGE", "sizeBytes": "12"}"#,
        )
        .unwrap();
        assert_eq!(info.asset_type, "IMAGE");
    }
}
