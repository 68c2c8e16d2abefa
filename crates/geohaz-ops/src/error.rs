//! Error types for the operation pipeline.

use ee_expr::{CodecError, HandleKind, ParseLiteralError};
use geohaz_catalog::CatalogError;
use geohaz_gateway::GatewayError;
use serde::Serialize;
use thiserror::Error;

/// The two failure categories that cross the tool boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Detected locally before any remote call.
    Validation,
    /// Reported by the remote compute service.
    Remote,
}

impl ErrorCategory {
    /// Lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Remote => "remote",
        }
    }
}

/// Errors returned by pipeline operations and the map renderer.
#[derive(Debug, Error)]
pub enum OpsError {
    /// No dataset with the requested id.
    #[error("unknown dataset '{id}' (available: {})", .available.join(", "))]
    UnknownDataset {
        /// Requested id.
        id: String,
        /// Ids present in the catalog.
        available: Vec<String>,
    },

    /// The dataset's asset could not be resolved remotely.
    #[error("cannot resolve asset for dataset '{dataset}': {source}")]
    AssetResolution {
        /// Dataset id.
        dataset: String,
        /// Remote error.
        #[source]
        source: GatewayError,
    },

    /// A handle is malformed or refers to an asset that no longer resolves.
    #[error("cannot decode '{parameter}': {message}")]
    Deserialization {
        /// Offending parameter.
        parameter: &'static str,
        /// What went wrong.
        message: String,
    },

    /// A handle decodes to the wrong kind for its parameter.
    #[error("'{parameter}': expected {expected} handle, got {actual}")]
    TypeMismatch {
        /// Offending parameter.
        parameter: &'static str,
        /// Kind the operation needs.
        expected: HandleKind,
        /// Kind the handle has.
        actual: HandleKind,
    },

    /// A parameter is out of range or not a recognized literal.
    #[error("invalid '{parameter}': {message}")]
    Validation {
        /// Offending parameter.
        parameter: &'static str,
        /// What is wrong.
        message: String,
    },

    /// The remote service failed while evaluating an operation.
    #[error("{operation} failed remotely: {source}")]
    RemoteCompute {
        /// Operation name.
        operation: &'static str,
        /// Remote error.
        #[source]
        source: GatewayError,
    },

    /// The map could not be composed.
    #[error("cannot render map: {0}")]
    Render(String),
}

impl OpsError {
    /// Create a validation error.
    pub fn validation(parameter: &'static str, message: impl Into<String>) -> Self {
        OpsError::Validation {
            parameter,
            message: message.into(),
        }
    }

    /// Wrap a codec error for the given parameter.
    pub fn from_codec(parameter: &'static str, err: CodecError) -> Self {
        match err {
            CodecError::KindMismatch { expected, actual } => OpsError::TypeMismatch {
                parameter,
                expected,
                actual,
            },
            other => OpsError::Deserialization {
                parameter,
                message: other.to_string(),
            },
        }
    }

    /// Wrap a rejected literal for the given parameter.
    pub fn from_literal(parameter: &'static str, err: ParseLiteralError) -> Self {
        OpsError::validation(parameter, err.to_string())
    }

    /// Category reported at the tool boundary.
    pub fn category(&self) -> ErrorCategory {
        match self {
            OpsError::AssetResolution { .. } | OpsError::RemoteCompute { .. } => {
                ErrorCategory::Remote
            }
            _ => ErrorCategory::Validation,
        }
    }

    /// Stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            OpsError::UnknownDataset { .. } => "UnknownDatasetError",
            OpsError::AssetResolution { .. } => "AssetResolutionError",
            OpsError::Deserialization { .. } => "DeserializationError",
            OpsError::TypeMismatch { .. } => "TypeMismatchError",
            OpsError::Validation { .. } => "ValidationError",
            OpsError::RemoteCompute { .. } => "RemoteComputeError",
            OpsError::Render(_) => "RenderError",
        }
    }
}

impl From<CatalogError> for OpsError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownDataset { id, available } => {
                OpsError::UnknownDataset { id, available }
            }
            other => OpsError::validation("dataset", other.to_string()),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, OpsError>;
