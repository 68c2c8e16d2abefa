//! Image expressions.

use crate::{Comparison, Geometry, Node, Reducer, Remote};

/// A remote raster image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image(pub(crate) Node);

impl Image {
    /// Load a single image asset.
    pub fn load(asset_id: &str) -> Self {
        Image(Node::invoke("Image.load", [("id", Node::constant(asset_id))]))
    }

    /// Mosaic every member of an image collection asset into one image.
    pub fn mosaic(collection_id: &str) -> Self {
        let collection =
            Node::invoke("ImageCollection.load", [("id", Node::constant(collection_id))]);
        Image(Node::invoke("ImageCollection.mosaic", [("collection", collection)]))
    }

    /// An image with the same value everywhere.
    pub fn constant(value: f64) -> Self {
        Image(Node::invoke("Image.constant", [("value", Node::constant(value))]))
    }

    /// Pixelwise comparison against a constant, 1 where it holds and 0 elsewhere.
    ///
    /// Pixels masked in `self` stay masked; see [`Image::unmask`].
    pub fn compare(&self, comparison: Comparison, threshold: f64) -> Self {
        self.binary(comparison.function_name(), Image::constant(threshold))
    }

    /// Replace masked pixels with `value`, everywhere on the globe.
    pub fn unmask(&self, value: f64) -> Self {
        Image(Node::invoke(
            "Image.unmask",
            [
                ("input", self.0.clone()),
                ("value", Node::constant(value)),
                ("sameFootprint", Node::constant(false)),
            ],
        ))
    }

    /// Pixelwise logical OR.
    pub fn or(&self, other: &Image) -> Self {
        self.binary("Image.or", other.clone())
    }

    /// Pixelwise logical AND.
    pub fn and(&self, other: &Image) -> Self {
        self.binary("Image.and", other.clone())
    }

    fn binary(&self, function: &str, other: Image) -> Self {
        Image(Node::invoke(
            function,
            [("image1", self.0.clone()), ("image2", other.0)],
        ))
    }

    /// Restrict the image to a geometry; pixels outside are masked.
    pub fn clip(&self, geometry: &Geometry) -> Self {
        Image(Node::invoke(
            "Image.clip",
            [("input", self.0.clone()), ("geometry", geometry.node().clone())],
        ))
    }

    /// Mask pixels where `mask` is zero or masked.
    pub fn update_mask(&self, mask: &Image) -> Self {
        Image(Node::invoke(
            "Image.updateMask",
            [("image", self.0.clone()), ("mask", mask.0.clone())],
        ))
    }

    /// Build a reduction over a region. The result evaluates to a dictionary keyed
    /// by band name, so it is returned as a bare tree rather than a typed object.
    pub fn reduce_region(
        &self,
        reducer: Reducer,
        geometry: &Geometry,
        scale: f64,
        max_pixels: u64,
    ) -> Node {
        let reducer = Node::invoke(reducer.function_name(), std::iter::empty::<(&str, Node)>());
        Node::invoke(
            "Image.reduceRegion",
            [
                ("image", self.0.clone()),
                ("reducer", reducer),
                ("geometry", geometry.node().clone()),
                ("scale", Node::constant(scale)),
                ("maxPixels", Node::constant(max_pixels)),
            ],
        )
    }
}
