//! The operation pipeline.
//!
//! Every operation takes handles in and returns a handle or a value out. Inputs are
//! decoded and validated locally first; only then is the gateway contacted, at
//! most once per operation. No state survives between calls.

use crate::reduce::ReductionResult;
use crate::{OpsError, Result};
use ee_expr::{
    Comparison, FeatureCollection, Geometry, HandleKind, Image, ParseLiteralError, Reducer,
    Remote, SerializedHandle,
};
use geohaz_catalog::{Catalog, DatasetDescriptor};
use geohaz_gateway::{AssetInfo, ComputeGateway, GatewayError};
use geohaz_metrics::{metric_defs, metrics, OperationLabels};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info_span, warn};

/// Default reduction scale in meters.
pub const DEFAULT_SCALE: f64 = 100.0;

/// Default pixel budget for a reduction.
pub const DEFAULT_MAX_PIXELS: u64 = 10_000_000_000;

/// Default geometry error margin in meters.
pub const DEFAULT_MAX_ERROR: f64 = 1.0;

/// Error margin used when simplifying administrative boundaries, in meters.
const BOUNDARY_SIMPLIFY_METERS: f64 = 100.0;

// ============================================================================
// Settings and parameters
// ============================================================================

/// Tunables shared by all operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineSettings {
    /// Reduction scale used when a call does not give one, in meters.
    pub default_scale: f64,
    /// Maximum number of pixels a reduction may touch.
    pub max_pixels: u64,
    /// Error margin for geometry operations, in meters.
    pub max_error: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            default_scale: DEFAULT_SCALE,
            max_pixels: DEFAULT_MAX_PIXELS,
            max_error: DEFAULT_MAX_ERROR,
        }
    }
}

/// Administrative level for boundary lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaType {
    /// A whole country, by ISO 3166-1 alpha-3 code.
    Country,
    /// A first-level subdivision, by its boundary-table code.
    Admin1,
}

impl AreaType {
    /// Accepted literals.
    pub const LITERALS: &'static [&'static str] = &["country", "admin1"];

    /// The literal form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaType::Country => "country",
            AreaType::Admin1 => "admin1",
        }
    }
}

impl fmt::Display for AreaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaType {
    type Err = ParseLiteralError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "country" => Ok(AreaType::Country),
            "admin1" => Ok(AreaType::Admin1),
            _ => Err(ParseLiteralError {
                what: "area type",
                literal: s.to_string(),
                expected: Self::LITERALS,
            }),
        }
    }
}

impl Serialize for AreaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AreaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Results
// ============================================================================

/// A dataset image handle with its metadata.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetImage {
    /// Handle of the dataset image.
    pub image: SerializedHandle,
    /// Dataset metadata.
    pub metadata: DatasetDescriptor,
}

/// Outcome of checking a handle's asset references.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedHandle {
    /// Kind of the handle.
    pub kind: HandleKind,
    /// Every asset the handle loads, as reported by the service.
    pub assets: Vec<AssetInfo>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Stateless operations over a shared catalog and gateway.
#[derive(Clone)]
pub struct Pipeline {
    gateway: Arc<dyn ComputeGateway>,
    catalog: Arc<Catalog>,
    settings: PipelineSettings,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("datasets", &self.catalog.len())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Decode a handle parameter as a typed object.
fn decode<T: Remote>(parameter: &'static str, handle: &SerializedHandle) -> Result<T> {
    handle.decode().map_err(|e| OpsError::from_codec(parameter, e))
}

fn require_finite(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(OpsError::validation(parameter, format!("must be a finite number, got {}", value)))
    }
}

impl Pipeline {
    /// Create a pipeline.
    pub fn new(
        gateway: Arc<dyn ComputeGateway>,
        catalog: Arc<Catalog>,
        settings: PipelineSettings,
    ) -> Self {
        Pipeline {
            gateway,
            catalog,
            settings,
        }
    }

    /// The dataset catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The settings in effect.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub(crate) fn gateway(&self) -> &dyn ComputeGateway {
        self.gateway.as_ref()
    }

    /// Run one operation inside its span, counting calls and failures.
    pub(crate) fn run<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let span = info_span!("op", operation);
        let _guard = span.enter();
        let labels = OperationLabels::new(operation);
        metrics::counter!(metric_defs::OPERATION_CALLS.name, &labels.to_labels()).increment(1);

        let result = f();
        if let Err(err) = &result {
            let category = err.category();
            metrics::counter!(
                metric_defs::OPERATION_FAILURES.name,
                &labels.with(&[("category", category.as_str().to_string())])
            )
            .increment(1);
            warn!(
                kind = err.kind(),
                category = category.as_str(),
                error = %err,
                "operation failed"
            );
        }
        result
    }

    /// Encode a result handle, recording its size.
    fn emit<T: Remote>(&self, operation: &'static str, object: &T) -> SerializedHandle {
        let handle = object.encode();
        metrics::histogram!(
            metric_defs::HANDLE_SIZE.name,
            &OperationLabels::new(operation).to_labels()
        )
        .record(handle.token().len() as f64);
        debug!(kind = %handle.kind(), fingerprint = %handle.fingerprint(), "emitted handle");
        handle
    }

    fn remote(operation: &'static str) -> impl FnOnce(GatewayError) -> OpsError {
        move |source| OpsError::RemoteCompute { operation, source }
    }

    // ------------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------------

    /// All datasets in catalog order.
    pub fn list_datasets(&self) -> &[DatasetDescriptor] {
        self.catalog.list_datasets()
    }

    /// Metadata for one dataset.
    pub fn get_dataset(&self, id: &str) -> Result<&DatasetDescriptor> {
        Ok(self.catalog.get_dataset(id)?)
    }

    /// Build the image for a dataset and return its handle with the metadata.
    ///
    /// The asset is looked up remotely first so a missing or forbidden asset is
    /// reported here rather than at first use.
    pub fn get_dataset_image(&self, id: &str) -> Result<DatasetImage> {
        self.run("get_dataset_image", || {
            let dataset = self.catalog.get_dataset(id)?;
            self.gateway
                .get_asset(&dataset.asset_id)
                .map_err(|source| OpsError::AssetResolution {
                    dataset: dataset.id.clone(),
                    source,
                })?;

            let mut image = if dataset.mosaic {
                Image::mosaic(&dataset.asset_id)
            } else {
                Image::load(&dataset.asset_id)
            };
            if let Some(valid_max) = dataset.valid_max {
                image = image.update_mask(&image.compare(Comparison::Lte, valid_max));
            }

            Ok(DatasetImage {
                image: self.emit("get_dataset_image", &image),
                metadata: dataset.clone(),
            })
        })
    }

    // ------------------------------------------------------------------------
    // Images
    // ------------------------------------------------------------------------

    /// Restrict an image to a geometry.
    pub fn mask_image(
        &self,
        image: &SerializedHandle,
        geometry: &SerializedHandle,
    ) -> Result<SerializedHandle> {
        self.run("mask_image", || {
            let image: Image = decode("image", image)?;
            let geometry: Geometry = decode("geometry", geometry)?;
            Ok(self.emit("mask_image", &image.clip(&geometry)))
        })
    }

    /// Mask an image with another image: pixels where `mask` is 0 become undefined.
    pub fn mask_image_with_image(
        &self,
        image: &SerializedHandle,
        mask: &SerializedHandle,
    ) -> Result<SerializedHandle> {
        self.run("mask_image_with_image", || {
            let image: Image = decode("image", image)?;
            let mask: Image = decode("mask_image", mask)?;
            Ok(self.emit("mask_image_with_image", &image.update_mask(&mask)))
        })
    }

    /// Binary image: 1 where `pixel <comparison> threshold`, 0 elsewhere, including
    /// where the source is undefined.
    ///
    /// Without a comparison, `lt` is used for negative thresholds and `gt` otherwise.
    pub fn filter_image_by_threshold(
        &self,
        image: &SerializedHandle,
        threshold: f64,
        comparison: Option<Comparison>,
    ) -> Result<SerializedHandle> {
        self.run("filter_image_by_threshold", || {
            let threshold = require_finite("threshold", threshold)?;
            let image: Image = decode("image", image)?;
            let comparison = comparison.unwrap_or_else(|| Comparison::default_for(threshold));
            let binary = image.compare(comparison, threshold).unmask(0.0);
            Ok(self.emit("filter_image_by_threshold", &binary))
        })
    }

    /// Pixelwise OR of two binary images.
    ///
    /// Inputs are expected to hold only 0 and 1; this is not checked.
    pub fn union_binary_images(
        &self,
        a: &SerializedHandle,
        b: &SerializedHandle,
    ) -> Result<SerializedHandle> {
        self.union_all(&[a.clone(), b.clone()])
    }

    /// Pixelwise AND of two binary images.
    ///
    /// Inputs are expected to hold only 0 and 1; this is not checked.
    pub fn intersect_binary_images(
        &self,
        a: &SerializedHandle,
        b: &SerializedHandle,
    ) -> Result<SerializedHandle> {
        self.intersect_all(&[a.clone(), b.clone()])
    }

    /// Pixelwise OR of two or more binary images. Undefined pixels count as 0.
    pub fn union_all(&self, images: &[SerializedHandle]) -> Result<SerializedHandle> {
        self.run("union_binary_images", || {
            let images = decode_many::<Image>("images", images)?;
            let union = images
                .iter()
                .skip(1)
                .fold(images[0].unmask(0.0), |acc, img| acc.or(&img.unmask(0.0)));
            Ok(self.emit("union_binary_images", &union))
        })
    }

    /// Pixelwise AND of two or more binary images.
    pub fn intersect_all(&self, images: &[SerializedHandle]) -> Result<SerializedHandle> {
        self.run("intersect_binary_images", || {
            let images = decode_many::<Image>("images", images)?;
            let intersection = images
                .iter()
                .skip(1)
                .fold(images[0].clone(), |acc, img| acc.and(img));
            Ok(self.emit("intersect_binary_images", &intersection))
        })
    }

    /// Aggregate pixel values inside a geometry.
    ///
    /// `scale` is the pixel size in meters; the configured default applies when absent.
    pub fn reduce_image(
        &self,
        image: &SerializedHandle,
        geometry: &SerializedHandle,
        reducer: Reducer,
        scale: Option<f64>,
    ) -> Result<ReductionResult> {
        self.run("reduce_image", || {
            let scale = require_finite("scale", scale.unwrap_or(self.settings.default_scale))?;
            if scale <= 0.0 {
                return Err(OpsError::validation(
                    "scale",
                    format!("must be positive, got {}", scale),
                ));
            }
            let image: Image = decode("image", image)?;
            let geometry: Geometry = decode("geometry", geometry)?;

            let expression =
                image.reduce_region(reducer, &geometry, scale, self.settings.max_pixels);
            let value = self
                .gateway
                .compute_value(&expression)
                .map_err(Self::remote("reduce_image"))?;
            ReductionResult::from_value(reducer, scale, value)
                .map_err(Self::remote("reduce_image"))
        })
    }

    // ------------------------------------------------------------------------
    // Geometries and collections
    // ------------------------------------------------------------------------

    /// Dilate (positive) or erode (negative) a geometry by `distance` meters.
    ///
    /// A distance of 0 returns the input geometry unchanged.
    pub fn get_zone_of_area(
        &self,
        geometry: &SerializedHandle,
        distance: f64,
    ) -> Result<SerializedHandle> {
        self.run("get_zone_of_area", || {
            let distance = require_finite("buffer_distance", distance)?;
            let geometry: Geometry = decode("geometry", geometry)?;
            if distance == 0.0 {
                return Ok(self.emit("get_zone_of_area", &geometry));
            }
            let zone = geometry.buffer(distance, self.settings.max_error);
            Ok(self.emit("get_zone_of_area", &zone))
        })
    }

    /// The boundary of a country or first-level subdivision as a one-feature collection.
    pub fn get_admin_boundary(&self, code: &str, area_type: AreaType) -> Result<SerializedHandle> {
        self.run("get_admin_boundary", || {
            let code = code.trim();
            let tables = self.catalog.boundaries();
            let (table, value) = match area_type {
                AreaType::Country => {
                    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                        return Err(OpsError::validation(
                            "code",
                            format!("'{}' is not an ISO 3166-1 alpha-3 country code", code),
                        ));
                    }
                    (&tables.country, Value::from(code.to_ascii_uppercase()))
                }
                AreaType::Admin1 => {
                    if code.is_empty() {
                        return Err(OpsError::validation("code", "admin1 code is empty"));
                    }
                    // Subdivision codes are numeric in the boundary tables.
                    let value = code
                        .parse::<i64>()
                        .map(Value::from)
                        .unwrap_or_else(|_| Value::from(code));
                    (&tables.admin1, value)
                }
            };

            let units = FeatureCollection::load_table(&table.table)
                .filter_equals(&table.field, value.clone());
            let outline = units
                .geometry(self.settings.max_error)
                .simplify(BOUNDARY_SIMPLIFY_METERS);

            let mut properties = Map::new();
            properties.insert(table.field.clone(), value);
            properties.insert("area_type".to_string(), Value::from(area_type.as_str()));
            let boundary = FeatureCollection::from_features([(outline, properties)]);
            Ok(self.emit("get_admin_boundary", &boundary))
        })
    }

    /// Dissolve a feature collection into a single geometry.
    pub fn collection_geometry(&self, collection: &SerializedHandle) -> Result<SerializedHandle> {
        self.run("collection_geometry", || {
            let fc: FeatureCollection = decode("collection", collection)?;
            Ok(self.emit("collection_geometry", &fc.geometry(self.settings.max_error)))
        })
    }

    /// Pairwise intersections of overlapping features from two collections.
    pub fn intersect_feature_collections(
        &self,
        fc1: &SerializedHandle,
        fc2: &SerializedHandle,
    ) -> Result<SerializedHandle> {
        self.run("intersect_feature_collections", || {
            let a: FeatureCollection = decode("collection1", fc1)?;
            let b: FeatureCollection = decode("collection2", fc2)?;
            let intersection = a.intersect(&b, self.settings.max_error);
            Ok(self.emit("intersect_feature_collections", &intersection))
        })
    }

    /// Features of `fc1` followed by features of `fc2`, without deduplication.
    pub fn merge_feature_collections(
        &self,
        fc1: &SerializedHandle,
        fc2: &SerializedHandle,
    ) -> Result<SerializedHandle> {
        self.merge_all(&[fc1.clone(), fc2.clone()])
    }

    /// Concatenate two or more feature collections in order.
    pub fn merge_all(&self, collections: &[SerializedHandle]) -> Result<SerializedHandle> {
        self.run("merge_feature_collections", || {
            let collections = decode_many::<FeatureCollection>("collections", collections)?;
            let merged = collections
                .iter()
                .skip(1)
                .fold(collections[0].clone(), |acc, fc| acc.merge(fc));
            Ok(self.emit("merge_feature_collections", &merged))
        })
    }

    // ------------------------------------------------------------------------
    // Handles
    // ------------------------------------------------------------------------

    /// Check that every asset a handle loads still resolves.
    ///
    /// A missing or inaccessible asset is a [`OpsError::Deserialization`]: the
    /// handle no longer refers to anything.
    pub fn verify_handle(&self, handle: &SerializedHandle) -> Result<VerifiedHandle> {
        self.run("verify_handle", || {
            let mut assets = Vec::new();
            for asset_id in handle.referenced_assets() {
                match self.gateway.get_asset(&asset_id) {
                    Ok(info) => assets.push(info),
                    Err(err) if err.is_not_found() || err.is_permission_denied() => {
                        return Err(OpsError::Deserialization {
                            parameter: "handle",
                            message: format!("asset '{}' no longer resolves: {}", asset_id, err),
                        })
                    }
                    Err(err) => return Err(Self::remote("verify_handle")(err)),
                }
            }
            Ok(VerifiedHandle {
                kind: handle.kind(),
                assets,
            })
        })
    }
}

/// Decode at least two handles of the same kind.
fn decode_many<T: Remote>(parameter: &'static str, handles: &[SerializedHandle]) -> Result<Vec<T>> {
    if handles.len() < 2 {
        return Err(OpsError::validation(
            parameter,
            format!("needs at least two inputs, got {}", handles.len()),
        ));
    }
    handles.iter().map(|h| decode(parameter, h)).collect()
}
