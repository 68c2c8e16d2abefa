//! Remote compute gateway.
//!
//! All pixel and geometry math runs on the remote service. This crate defines the
//! [`ComputeGateway`] seam the pipeline talks to and [`RestGateway`], its HTTP
//! implementation. Tests substitute their own implementation of the trait.

mod credentials;
mod error;
mod rest;
mod types;

pub use credentials::{load_token, parse_token_file, resolve_token, TOKEN_ENV_VAR};
pub use error::{GatewayError, Result};
pub use rest::{
    asset_resource_name, RequestStats, RestGateway, RestGatewayConfig, DEFAULT_BASE_URL,
    DEFAULT_TIMEOUT,
};
pub use types::{AccessToken, AssetInfo, DisplayRange, TileSource, VisualizationOptions};

use ee_expr::Node;
use serde_json::Value;

/// Operations the remote compute service provides.
///
/// Implementations must be shareable across threads; every call is independent
/// and blocks until the service answers or fails.
pub trait ComputeGateway: Send + Sync {
    /// Evaluate an expression and return its value as JSON.
    ///
    /// Geometries come back as GeoJSON, feature collections as GeoJSON
    /// `FeatureCollection`s, reductions as dictionaries.
    fn compute_value(&self, expression: &Node) -> Result<Value>;

    /// Register an image for tiled display.
    fn create_map(&self, image: &Node, vis: &VisualizationOptions) -> Result<TileSource>;

    /// Fetch asset metadata. Fails with a not-found or permission error when the
    /// asset cannot be resolved.
    fn get_asset(&self, asset_id: &str) -> Result<AssetInfo>;
}
