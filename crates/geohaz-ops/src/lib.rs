//! Geospatial hazard operations.
//!
//! [`Pipeline`] holds the dataset catalog and a [`ComputeGateway`] and exposes the
//! operations callers chain together: each takes serialized handles, rebuilds the
//! typed expressions, extends them and hands back new handles. Reductions and map
//! rendering are the only operations that evaluate anything remotely; dataset image
//! construction and handle verification look up asset metadata.
//!
//! ## Example
//!
//! ```ignore
//! let pipeline = Pipeline::new(gateway, catalog, PipelineSettings::default());
//! let flood = pipeline.get_dataset_image("river_flood")?;
//! let flooded = pipeline.filter_image_by_threshold(&flood.image, 0.01, None)?;
//! let kenya = pipeline.get_admin_boundary("KEN", AreaType::Country)?;
//! let outline = pipeline.collection_geometry(&kenya)?;
//! let area = pipeline.reduce_image(&flooded, &outline, Reducer::Sum, None)?;
//! ```
//!
//! [`ComputeGateway`]: geohaz_gateway::ComputeGateway

mod error;
mod html;
mod map;
mod pipeline;
mod reduce;

pub use error::{ErrorCategory, OpsError, Result};
pub use html::{script_safe_json, BASE_TILE_URL};
pub use map::{
    geojson_bounds, MapArtifact, MapBuilder, MapLayer, MapView, VisualizationParams,
    DEFAULT_OPACITY, DEFAULT_TITLE,
};
pub use pipeline::{
    AreaType, DatasetImage, Pipeline, PipelineSettings, VerifiedHandle, DEFAULT_MAX_ERROR,
    DEFAULT_MAX_PIXELS, DEFAULT_SCALE,
};
pub use reduce::ReductionResult;
