//! Feature collection expressions.

use crate::geometry::error_margin;
use crate::{Geometry, Node, Remote};
use serde_json::{Map, Value};

/// Outer mapping variable name, following the remote client's convention.
const OUTER_VAR: &str = "_MAPPING_VAR_1_0";
/// Inner mapping variable name.
const INNER_VAR: &str = "_MAPPING_VAR_0_0";

/// Property holding the area of each pairwise intersection, in square meters.
pub const OVERLAP_AREA_PROPERTY: &str = "overlap_area";

/// A remote collection of features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection(pub(crate) Node);

fn feature(geometry: Node, properties: Map<String, Value>) -> Node {
    Node::invoke(
        "Feature",
        [
            ("geometry", geometry),
            ("metadata", Node::constant(Value::Object(properties))),
        ],
    )
}

fn feature_geometry(feature: Node) -> Node {
    Node::invoke("Feature.geometry", [("feature", feature)])
}

fn filter(collection: Node, filter: Node) -> Node {
    Node::invoke("Collection.filter", [("collection", collection), ("filter", filter)])
}

impl FeatureCollection {
    /// Load a table asset.
    pub fn load_table(table_id: &str) -> Self {
        FeatureCollection(Node::invoke(
            "Collection.loadTable",
            [("tableId", Node::constant(table_id))],
        ))
    }

    /// A collection built from geometries and their properties, in order.
    pub fn from_features<I>(features: I) -> Self
    where
        I: IntoIterator<Item = (Geometry, Map<String, Value>)>,
    {
        let features = features
            .into_iter()
            .map(|(geometry, properties)| feature(geometry.into_node(), properties))
            .collect();
        FeatureCollection(Node::invoke("Collection", [("features", Node::Array(features))]))
    }

    /// Features of `self` followed by features of `other`. Nothing is deduplicated.
    pub fn merge(&self, other: &FeatureCollection) -> Self {
        FeatureCollection(Node::invoke(
            "Collection.merge",
            [("collection1", self.0.clone()), ("collection2", other.0.clone())],
        ))
    }

    /// Keep features whose `field` equals `value`.
    pub fn filter_equals(&self, field: &str, value: impl Into<Value>) -> Self {
        let predicate = Node::invoke(
            "Filter.equals",
            [("leftField", Node::constant(field)), ("rightValue", Node::constant(value))],
        );
        FeatureCollection(filter(self.0.clone(), predicate))
    }

    /// The union of all member geometries.
    pub fn geometry(&self, max_error: f64) -> Geometry {
        Geometry(Node::invoke(
            "Collection.geometry",
            [("collection", self.0.clone()), ("maxError", error_margin(max_error))],
        ))
    }

    /// Pairwise geometric intersections of overlapping features.
    ///
    /// For every feature `a` of `self` and `b` of `other` whose geometries intersect,
    /// the result holds one feature with geometry `a ∩ b`, the properties of `a`
    /// overlaid with those of `b`, and [`OVERLAP_AREA_PROPERTY`]. Pairs that only
    /// touch have zero overlap and are dropped.
    pub fn intersect(&self, other: &FeatureCollection, max_error: f64) -> Self {
        let a = || Node::argument(OUTER_VAR);
        let b = || Node::argument(INNER_VAR);

        let overlap = Node::invoke(
            "Geometry.intersection",
            [
                ("left", feature_geometry(a())),
                ("right", feature_geometry(b())),
                ("maxError", error_margin(max_error)),
            ],
        );
        let clipped = Node::invoke(
            "Element.copyProperties",
            [
                (
                    "destination",
                    Node::invoke(
                        "Feature.intersection",
                        [("left", a()), ("right", b()), ("maxError", error_margin(max_error))],
                    ),
                ),
                ("source", b()),
            ],
        );
        let inner_body = Node::invoke(
            "Element.set",
            [
                ("object", clipped),
                ("key", Node::constant(OVERLAP_AREA_PROPERTY)),
                (
                    "value",
                    Node::invoke(
                        "Geometry.area",
                        [("geometry", overlap), ("maxError", error_margin(max_error))],
                    ),
                ),
            ],
        );

        let candidates = filter(
            other.0.clone(),
            Node::invoke(
                "Filter.intersects",
                [
                    ("leftField", Node::constant(".geo")),
                    ("rightValue", feature_geometry(a())),
                ],
            ),
        );
        let per_feature = Node::invoke(
            "Collection.map",
            [
                ("collection", candidates),
                ("baseAlgorithm", Node::lambda(INNER_VAR, inner_body)),
            ],
        );
        let nested = Node::invoke(
            "Collection.map",
            [
                ("collection", self.0.clone()),
                ("baseAlgorithm", Node::lambda(OUTER_VAR, per_feature)),
            ],
        );
        let flat = Node::invoke("Collection.flatten", [("collection", nested)]);

        let non_empty = Node::invoke(
            "Filter.greaterThan",
            [
                ("leftField", Node::constant(OVERLAP_AREA_PROPERTY)),
                ("rightValue", Node::constant(0.0)),
            ],
        );
        FeatureCollection(filter(flat, non_empty))
    }
}
