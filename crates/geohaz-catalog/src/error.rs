//! Error types for the catalog crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        /// Catalog path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML or has the wrong top-level shape.
    #[error("invalid catalog document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A dataset entry is missing a field, has an unknown one, or a bad value.
    #[error("invalid dataset '{dataset}': {message}")]
    InvalidDataset {
        /// Dataset id.
        dataset: String,
        /// What is wrong.
        message: String,
    },

    /// A palette color is not `#RGB` or `#RRGGBB`.
    #[error("invalid color '{color}' in dataset '{dataset}' (expected #RGB or #RRGGBB)")]
    InvalidColor {
        /// Dataset id.
        dataset: String,
        /// The rejected color.
        color: String,
    },

    /// Two dataset ids are equal ignoring case.
    #[error("dataset id '{0}' is defined more than once")]
    DuplicateId(String),

    /// No dataset with the requested id.
    #[error("unknown dataset '{id}' (available: {})", .available.join(", "))]
    UnknownDataset {
        /// Requested id.
        id: String,
        /// Ids present in the catalog.
        available: Vec<String>,
    },
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
