//! Earth Engine expression graphs.
//!
//! This crate provides:
//! - [`Node`] - a resolved expression tree, and the wire form ([`Expression`])
//! - [`encode_expression`] / [`decode_expression`] - conversion between the two
//! - [`SerializedHandle`] - a transport-safe token tagged with its [`HandleKind`]
//! - [`Image`], [`Geometry`], [`FeatureCollection`] - typed builders for the
//!   remote algorithm vocabulary
//!
//! Nothing here talks to the network. A handle carries the full expression that
//! produces an object, so it can be passed between independent calls and
//! re-evaluated by the remote service each time.
//!
//! ## Example
//!
//! ```
//! use ee_expr::{Comparison, Image, Remote, SerializedHandle, HandleKind};
//!
//! let flooded = Image::load("projects/unicef-ccri/assets/river_flood")
//!     .compare(Comparison::Gte, 0.01)
//!     .unmask(0.0);
//! let handle = flooded.encode();
//!
//! let parsed = SerializedHandle::parse(handle.token()).unwrap();
//! assert_eq!(parsed.kind(), HandleKind::Image);
//! assert_eq!(parsed.decode::<Image>().unwrap(), flooded);
//! ```

mod algorithms;
mod codec;
mod collection;
mod error;
mod geometry;
mod handle;
mod image;
mod kind;
mod node;

pub use algorithms::{Comparison, Reducer};
pub use codec::{
    decode_expression, decode_from_str, encode_expression, encode_to_string, parse_expression,
    MAX_DEPTH, MAX_NODES, ROOT_KEY,
};
pub use collection::{FeatureCollection, OVERLAP_AREA_PROPERTY};
pub use error::{CodecError, ParseLiteralError};
pub use geometry::Geometry;
pub use handle::{Remote, RemoteObject, SerializedHandle};
pub use image::Image;
pub use kind::{infer_kind, HandleKind};
pub use node::{
    Expression, FunctionDefinition, Invocation, Node, ValueNode, WireArray, WireDictionary,
    WireFunctionDefinition, WireInvocation,
};

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
