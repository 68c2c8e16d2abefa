//! Object kinds and kind inference.
//!
//! A decoded expression is classified by the function at its root. Families are
//! matched by name prefix, then a short list of exceptions covers the members of a
//! family that produce something else (a dictionary, a number, a geometry).
//! Collection operations that only reshape their input, such as `Collection.filter`,
//! take the kind of the collection they are applied to.

use crate::{CodecError, Node};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of remote object that can travel as a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    /// A raster image.
    Image,
    /// A vector geometry.
    Geometry,
    /// A collection of features.
    FeatureCollection,
}

impl HandleKind {
    /// All supported kinds.
    pub const ALL: [HandleKind; 3] = [
        HandleKind::Image,
        HandleKind::Geometry,
        HandleKind::FeatureCollection,
    ];

    /// Display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleKind::Image => "Image",
            HandleKind::Geometry => "Geometry",
            HandleKind::FeatureCollection => "FeatureCollection",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a function outside the supported kinds produces.
const DICTIONARY: &str = "a dictionary";
const NUMBER: &str = "a number";
const LIST: &str = "a list";
const STRING: &str = "a string";
const FEATURE: &str = "a feature";
const IMAGE_COLLECTION: &str = "an image collection";
const OTHER: &str = "an unsupported object";

// ============================================================================
// Exceptions
// ============================================================================

/// `Image.*` functions that do not produce an image.
const IMAGE_EXCEPTIONS: &[(&str, Outcome)] = &[
    ("Image.reduceRegion", Outcome::Unsupported(DICTIONARY)),
    ("Image.reduceRegions", Outcome::Kind(HandleKind::FeatureCollection)),
    ("Image.sample", Outcome::Kind(HandleKind::FeatureCollection)),
    ("Image.sampleRegions", Outcome::Kind(HandleKind::FeatureCollection)),
    ("Image.reduceToVectors", Outcome::Kind(HandleKind::FeatureCollection)),
    ("Image.geometry", Outcome::Kind(HandleKind::Geometry)),
    ("Image.bandNames", Outcome::Unsupported(LIST)),
    ("Image.bandTypes", Outcome::Unsupported(DICTIONARY)),
    ("Image.get", Outcome::Unsupported(OTHER)),
    ("Image.propertyNames", Outcome::Unsupported(LIST)),
    ("Image.projection", Outcome::Unsupported(OTHER)),
    ("Image.date", Outcome::Unsupported(OTHER)),
];

/// `ImageCollection.*` functions that composite the collection into one image.
const IMAGE_COLLECTION_COMPOSITES: &[&str] = &[
    "ImageCollection.mosaic",
    "ImageCollection.qualityMosaic",
    "ImageCollection.reduce",
    "ImageCollection.median",
    "ImageCollection.mean",
    "ImageCollection.min",
    "ImageCollection.max",
    "ImageCollection.sum",
    "ImageCollection.first",
    "ImageCollection.toBands",
];

/// `Geometry.*` functions that do not produce a geometry.
const GEOMETRY_EXCEPTIONS: &[(&str, &str)] = &[
    ("Geometry.area", NUMBER),
    ("Geometry.length", NUMBER),
    ("Geometry.perimeter", NUMBER),
    ("Geometry.distance", NUMBER),
    ("Geometry.intersects", NUMBER),
    ("Geometry.contains", NUMBER),
    ("Geometry.containedIn", NUMBER),
    ("Geometry.disjoint", NUMBER),
    ("Geometry.withinDistance", NUMBER),
    ("Geometry.isUnbounded", NUMBER),
    ("Geometry.coordinates", LIST),
    ("Geometry.type", STRING),
    ("Geometry.projection", OTHER),
];

/// `Collection.*` functions that do not produce a feature collection.
const COLLECTION_EXCEPTIONS: &[(&str, Outcome)] = &[
    ("Collection.geometry", Outcome::Kind(HandleKind::Geometry)),
    ("Collection.first", Outcome::Unsupported(FEATURE)),
    ("Collection.size", Outcome::Unsupported(NUMBER)),
    ("Collection.toList", Outcome::Unsupported(LIST)),
    ("Collection.get", Outcome::Unsupported(OTHER)),
    ("Collection.reduceColumns", Outcome::Unsupported(DICTIONARY)),
];

/// Collection functions whose result has the kind of their input collection.
const PASS_THROUGH: &[(&str, &str)] = &[
    ("Collection.filter", "collection"),
    ("Collection.limit", "collection"),
    ("Collection.sort", "collection"),
    ("Collection.distinct", "collection"),
    ("Collection.set", "object"),
    ("Collection.randomColumn", "collection"),
    ("Collection.merge", "collection1"),
];

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Kind(HandleKind),
    Unsupported(&'static str),
}

// ============================================================================
// Inference
// ============================================================================

/// Infer the kind of object the expression rooted at `node` evaluates to.
pub fn infer_kind(node: &Node) -> Result<HandleKind, CodecError> {
    let inv = node.as_invocation().ok_or(CodecError::NotAnInvocation)?;
    let name = inv.function_name.as_str();

    if let Some((_, arg)) = PASS_THROUGH.iter().find(|(f, _)| *f == name) {
        return match inv.argument(arg) {
            Some(input @ Node::Invocation(_)) => match infer_kind(input) {
                // An image collection stays an image collection.
                Err(CodecError::UnsupportedKind { produces, .. }) => {
                    Err(CodecError::unsupported(name, produces))
                }
                other => other,
            },
            _ => Err(CodecError::UnknownFunction(name.to_string())),
        };
    }

    if let Some((_, outcome)) = IMAGE_EXCEPTIONS.iter().find(|(f, _)| *f == name) {
        return resolve(name, *outcome);
    }
    if let Some((_, outcome)) = COLLECTION_EXCEPTIONS.iter().find(|(f, _)| *f == name) {
        return resolve(name, *outcome);
    }
    if let Some((_, produces)) = GEOMETRY_EXCEPTIONS.iter().find(|(f, _)| *f == name) {
        return Err(CodecError::unsupported(name, *produces));
    }

    if name.starts_with("ImageCollection") {
        if IMAGE_COLLECTION_COMPOSITES.contains(&name) {
            return Ok(HandleKind::Image);
        }
        return Err(CodecError::unsupported(name, IMAGE_COLLECTION));
    }
    if name == "Image" || name.starts_with("Image.") {
        return Ok(HandleKind::Image);
    }
    if name == "Geometry"
        || name.starts_with("Geometry.")
        || name.starts_with("GeometryConstructors.")
    {
        return Ok(HandleKind::Geometry);
    }
    if name == "Collection" || name.starts_with("Collection.") || name == "FeatureCollection" {
        return Ok(HandleKind::FeatureCollection);
    }
    if name == "Feature.geometry" {
        return Ok(HandleKind::Geometry);
    }
    if name == "Feature" || name.starts_with("Feature.") || name.starts_with("Element.") {
        return Err(CodecError::unsupported(name, FEATURE));
    }
    if name.starts_with("Dictionary") || name.starts_with("Number") {
        return Err(CodecError::unsupported(name, OTHER));
    }

    Err(CodecError::UnknownFunction(name.to_string()))
}

fn resolve(name: &str, outcome: Outcome) -> Result<HandleKind, CodecError> {
    match outcome {
        Outcome::Kind(kind) => Ok(kind),
        Outcome::Unsupported(produces) => Err(CodecError::unsupported(name, produces)),
    }
}
