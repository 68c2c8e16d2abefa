//! Dataset catalog.
//!
//! Maps dataset ids to remote asset references and display metadata. The
//! catalog is read from YAML once at startup and never mutated afterwards.
//!
//! This crate provides:
//! - [`Catalog`] - the loaded registry, with ordered listing and lookup
//! - [`DatasetDescriptor`] - metadata for one dataset
//! - [`HexColor`] - a validated palette color
//! - [`BoundaryTables`] - administrative boundary tables used for zone lookups

mod catalog;
mod dataset;
mod error;

pub use catalog::{
    qualify_asset_id, BoundaryTable, BoundaryTables, Catalog, DEFAULT_BASE_ASSETS_PATH,
};
pub use dataset::{DatasetDescriptor, HexColor};
pub use error::{CatalogError, Result};
