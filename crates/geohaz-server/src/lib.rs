//! Tool server for the hazard operation pipeline.
//!
//! Loads the configuration and dataset catalog once at startup, connects the
//! REST gateway, and exposes every pipeline operation as a named tool over a
//! line-delimited JSON protocol (stdio or TCP).

pub mod config;
pub mod error;
pub mod tools;
pub mod transport;

pub use config::{Config, GatewaySection, ServerConfig, Transport, DEFAULT_PORT};
pub use error::{ConfigError, Result, ServerError};
pub use tools::{ToolServer, TOOLS};
pub use transport::{run_listener, serve_lines, serve_stdio, serve_tcp};

use geohaz_catalog::Catalog;
use geohaz_gateway::{load_token, ComputeGateway, RestGateway};
use geohaz_ops::Pipeline;
use std::sync::Arc;
use tracing::info;

/// Load the dataset catalog named by `config`.
pub fn load_catalog(config: &Config) -> Result<Catalog> {
    Ok(Catalog::load(&config.path_to_metadata, &config.base_assets_path)?)
}

/// Create the REST gateway, reading the access token once.
pub fn connect_gateway(config: &Config) -> Result<RestGateway> {
    let token = load_token(&config.path_to_ee_auth)?;
    let gateway = RestGateway::new(config.gateway.rest_config(), token)?;
    info!(
        base_url = %config.gateway.base_url,
        project = %config.gateway.project,
        "gateway ready"
    );
    Ok(gateway)
}

/// Build the pipeline over an existing gateway.
pub fn build_pipeline(config: &Config, gateway: Arc<dyn ComputeGateway>) -> Result<Pipeline> {
    let catalog = load_catalog(config)?;
    Ok(Pipeline::new(gateway, Arc::new(catalog), config.pipeline.clone()))
}
