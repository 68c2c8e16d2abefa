//! Error types for the server crate.

use geohaz_catalog::CatalogError;
use geohaz_gateway::GatewayError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading the server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML or has unexpected fields.
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that stop the server from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The dataset catalog failed to load.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The gateway could not be set up.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Transport I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for server setup and transports.
pub type Result<T> = std::result::Result<T, ServerError>;
