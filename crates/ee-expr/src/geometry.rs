//! Geometry expressions.
//!
//! Distances and error margins are in meters.

use crate::Node;
use serde_json::json;

/// A remote vector geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry(pub(crate) Node);

/// Build an `ErrorMargin` in meters.
pub(crate) fn error_margin(meters: f64) -> Node {
    Node::invoke(
        "ErrorMargin",
        [("value", Node::constant(meters)), ("unit", Node::constant("meters"))],
    )
}

impl Geometry {
    /// An axis-aligned rectangle in longitude/latitude.
    pub fn rectangle(west: f64, south: f64, east: f64, north: f64) -> Self {
        Geometry(Node::invoke(
            "GeometryConstructors.Rectangle",
            [
                ("coordinates", Node::constant(json!([west, south, east, north]))),
                ("geodesic", Node::constant(false)),
            ],
        ))
    }

    /// A polygon from rings of `[lon, lat]` positions; the first ring is the shell.
    pub fn polygon(rings: &[Vec<[f64; 2]>]) -> Self {
        Geometry(Node::invoke(
            "GeometryConstructors.Polygon",
            [
                ("coordinates", Node::constant(json!(rings))),
                ("geodesic", Node::constant(false)),
            ],
        ))
    }

    /// Dilate (positive) or erode (negative) the geometry by `distance` meters.
    pub fn buffer(&self, distance: f64, max_error: f64) -> Self {
        Geometry(Node::invoke(
            "Geometry.buffer",
            [
                ("geometry", self.0.clone()),
                ("distance", Node::constant(distance)),
                ("maxError", error_margin(max_error)),
            ],
        ))
    }

    /// Simplify the geometry within `max_error` meters.
    pub fn simplify(&self, max_error: f64) -> Self {
        Geometry(Node::invoke(
            "Geometry.simplify",
            [("geometry", self.0.clone()), ("maxError", error_margin(max_error))],
        ))
    }

    /// The intersection of two geometries.
    pub fn intersection(&self, other: &Geometry, max_error: f64) -> Self {
        Geometry(Node::invoke(
            "Geometry.intersection",
            [
                ("left", self.0.clone()),
                ("right", other.0.clone()),
                ("maxError", error_margin(max_error)),
            ],
        ))
    }
}
