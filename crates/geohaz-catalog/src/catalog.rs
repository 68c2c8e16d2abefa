//! Catalog loading and lookup.
//!
//! ## File Format
//!
//! ```yaml
//! datasets:
//!   river_flood:
//!     asset_id: river_flood          # prefixed with the base assets path
//!     image_filename: river_flood.tif
//!     description: Riverine flood depth, 100-year return period
//!     mosaic: false
//!     source_name: JRC
//!     source_url: https://data.jrc.ec.europa.eu/
//!     color_palette: ["#f7fbff", "#c6dbef", "#6baed6", "#2171b5", "#08306b"]
//!     threshold: 0.01                 # optional
//!     valid_max: 100                  # optional
//! boundaries:                         # optional
//!   country: {table: adm0_wfp, field: iso3}
//!   admin1: {table: adm1_wfp, field: adm1_code}
//! ```

use crate::dataset::{DatasetEntry, HexColor};
use crate::{CatalogError, DatasetDescriptor, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Default prefix for asset ids that are not fully qualified.
pub const DEFAULT_BASE_ASSETS_PATH: &str = "projects/unicef-ccri/assets";

/// Prefixes that mark an asset id as already fully qualified.
const QUALIFIED_PREFIXES: &[&str] = &["projects/", "users/"];

/// Qualify an asset id with `base` unless it already starts with a known root.
pub fn qualify_asset_id(base: &str, asset_id: &str) -> String {
    let asset_id = asset_id.trim().trim_start_matches('/');
    if QUALIFIED_PREFIXES.iter().any(|p| asset_id.starts_with(p)) {
        asset_id.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), asset_id)
    }
}

// ============================================================================
// Boundary tables
// ============================================================================

/// An administrative boundary table and the field holding each unit's code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryTable {
    /// Table asset id.
    pub table: String,
    /// Property matched against the requested code.
    pub field: String,
}

/// Boundary tables for each supported administrative level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryTables {
    /// National boundaries.
    #[serde(default = "default_country")]
    pub country: BoundaryTable,
    /// First-level subdivisions.
    #[serde(default = "default_admin1")]
    pub admin1: BoundaryTable,
}

fn default_country() -> BoundaryTable {
    BoundaryTable {
        table: "adm0_wfp".to_string(),
        field: "iso3".to_string(),
    }
}

fn default_admin1() -> BoundaryTable {
    BoundaryTable {
        table: "adm1_wfp".to_string(),
        field: "adm1_code".to_string(),
    }
}

impl Default for BoundaryTables {
    fn default() -> Self {
        BoundaryTables {
            country: default_country(),
            admin1: default_admin1(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    datasets: serde_yaml::Mapping,
    #[serde(default)]
    boundaries: BoundaryTables,
}

// ============================================================================
// Catalog
// ============================================================================

/// The immutable dataset registry.
///
/// Loaded once at startup and shared by `Arc`; there is no reload path.
#[derive(Debug, Clone)]
pub struct Catalog {
    datasets: Vec<DatasetDescriptor>,
    by_id: HashMap<String, usize>,
    boundaries: BoundaryTables,
}

impl Catalog {
    /// Load a catalog file, qualifying asset ids with `base_assets_path`.
    pub fn load(path: &Path, base_assets_path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_yaml_str(&text, base_assets_path)?;
        info!(
            path = %path.display(),
            datasets = catalog.len(),
            "loaded dataset catalog"
        );
        Ok(catalog)
    }

    /// Parse a catalog document.
    pub fn from_yaml_str(text: &str, base_assets_path: &str) -> Result<Self> {
        let file: CatalogFile = serde_yaml::from_str(text)?;

        let mut datasets = Vec::with_capacity(file.datasets.len());
        let mut by_id = HashMap::new();
        for (key, value) in file.datasets {
            let raw_id = match key {
                serde_yaml::Value::String(s) => s,
                other => {
                    return Err(CatalogError::InvalidDataset {
                        dataset: format!("{:?}", other),
                        message: "dataset ids must be strings".to_string(),
                    })
                }
            };
            let id = raw_id.trim().to_ascii_lowercase();
            if by_id.contains_key(&id) {
                return Err(CatalogError::DuplicateId(id));
            }

            let entry: DatasetEntry =
                serde_yaml::from_value(value).map_err(|e| CatalogError::InvalidDataset {
                    dataset: id.clone(),
                    message: e.to_string(),
                })?;
            let descriptor = validate(id.clone(), entry, base_assets_path)?;
            debug!(dataset = %id, asset = %descriptor.asset_id, "catalog entry");

            by_id.insert(id, datasets.len());
            datasets.push(descriptor);
        }

        let mut boundaries = file.boundaries;
        boundaries.country.table = qualify_asset_id(base_assets_path, &boundaries.country.table);
        boundaries.admin1.table = qualify_asset_id(base_assets_path, &boundaries.admin1.table);

        Ok(Catalog {
            datasets,
            by_id,
            boundaries,
        })
    }

    /// All datasets in definition order.
    pub fn list_datasets(&self) -> &[DatasetDescriptor] {
        &self.datasets
    }

    /// Look up a dataset by id, ignoring case.
    pub fn get_dataset(&self, id: &str) -> Result<&DatasetDescriptor> {
        self.by_id
            .get(&id.trim().to_ascii_lowercase())
            .map(|&i| &self.datasets[i])
            .ok_or_else(|| CatalogError::UnknownDataset {
                id: id.to_string(),
                available: self.ids().map(str::to_string).collect(),
            })
    }

    /// The dataset loading the given asset, if any.
    pub fn find_by_asset(&self, asset_id: &str) -> Option<&DatasetDescriptor> {
        self.datasets.iter().find(|d| d.asset_id == asset_id)
    }

    /// Dataset ids in definition order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.datasets.iter().map(|d| d.id.as_str())
    }

    /// Administrative boundary tables.
    pub fn boundaries(&self) -> &BoundaryTables {
        &self.boundaries
    }

    /// Number of datasets.
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Whether the catalog has no datasets.
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

fn validate(id: String, entry: DatasetEntry, base: &str) -> Result<DatasetDescriptor> {
    let invalid = |message: &str| CatalogError::InvalidDataset {
        dataset: id.clone(),
        message: message.to_string(),
    };

    if entry.asset_id.trim().is_empty() {
        return Err(invalid("asset_id is empty"));
    }
    if entry.color_palette.is_empty() {
        return Err(invalid("color_palette is empty"));
    }
    if entry.threshold.is_some_and(|t| !t.is_finite()) {
        return Err(invalid("threshold must be a finite number"));
    }
    if entry.valid_max.is_some_and(|v| !v.is_finite()) {
        return Err(invalid("valid_max must be a finite number"));
    }

    let color_palette = entry
        .color_palette
        .iter()
        .map(|c| {
            HexColor::parse(c).ok_or_else(|| CatalogError::InvalidColor {
                dataset: id.clone(),
                color: c.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DatasetDescriptor {
        asset_id: qualify_asset_id(base, &entry.asset_id),
        image_filename: entry.image_filename,
        description: entry.description,
        mosaic: entry.mosaic,
        source_name: entry.source_name,
        source_url: entry.source_url,
        color_palette,
        threshold: entry.threshold,
        valid_max: entry.valid_max,
        id,
    })
}
