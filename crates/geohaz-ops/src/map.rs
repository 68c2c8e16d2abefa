//! Map composition.
//!
//! A map is a base layer, any number of image overlays rendered by the remote
//! service, and an optional outline geometry. The result is one HTML document that
//! needs nothing but tile requests once opened.

use crate::html;
use crate::pipeline::Pipeline;
use crate::{OpsError, Result};
use ee_expr::{Geometry, Image, Remote, SerializedHandle};
use geohaz_catalog::{DatasetDescriptor, HexColor};
use geohaz_gateway::VisualizationOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::f64::consts::PI;
use tracing::debug;

/// Overlay opacity when none is given.
pub const DEFAULT_OPACITY: f64 = 0.7;

/// Title when none is given.
pub const DEFAULT_TITLE: &str = "Hazard map";

/// Palette for images that do not come from a catalog dataset.
const GRAYSCALE: &[&str] = &["#000000", "#ffffff"];

const MIN_ZOOM: u8 = 1;
const MAX_ZOOM: u8 = 18;
/// Zoom used when the outline is a single point.
const POINT_ZOOM: u8 = 12;
const GLOBAL_ZOOM: u8 = 2;

const TILE_SIZE: f64 = 256.0;
/// Nominal viewport the initial view is fitted to, in pixels.
const VIEW_WIDTH: f64 = 960.0;
const VIEW_HEIGHT: f64 = 600.0;

/// Web Mercator latitude limit.
const MAX_LATITUDE: f64 = 85.051_128_779_8;

// ============================================================================
// Parameters
// ============================================================================

/// Display settings for one overlay. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VisualizationParams {
    /// Value mapped to the first palette color.
    #[serde(default)]
    pub min: Option<f64>,
    /// Value mapped to the last palette color.
    #[serde(default)]
    pub max: Option<f64>,
    /// Palette as `#RGB` or `#RRGGBB` colors, low to high.
    #[serde(default)]
    pub palette: Option<Vec<String>>,
    /// Overlay opacity in `[0, 1]`.
    #[serde(default)]
    pub opacity: Option<f64>,
    /// Layer name shown in the legend.
    #[serde(default)]
    pub name: Option<String>,
}

/// One overlay as it appears in the finished map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayer {
    /// Legend name.
    pub name: String,
    /// Tile URL with `{z}`, `{x}`, `{y}` placeholders.
    pub tile_url: String,
    /// Lower display bound.
    pub min: f64,
    /// Upper display bound.
    pub max: f64,
    /// Display colors, low to high.
    pub palette: Vec<HexColor>,
    /// Overlay opacity.
    pub opacity: f64,
    /// Dataset the image was built from, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    /// Attribution name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// Attribution link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// Initial view of the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    /// Center latitude in degrees.
    pub center_lat: f64,
    /// Center longitude in degrees.
    pub center_lon: f64,
    /// Slippy-map zoom level.
    pub zoom: u8,
    /// `[west, south, east, north]` of the outline, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 4]>,
}

impl MapView {
    /// The view used when there is nothing to frame.
    pub fn global() -> Self {
        MapView {
            center_lat: 0.0,
            center_lon: 0.0,
            zoom: GLOBAL_ZOOM,
            bounds: None,
        }
    }

    /// Center on a bounding box and pick the deepest zoom that still shows all of it.
    pub fn fit(bounds: [f64; 4]) -> Self {
        let [west, south, east, north] = bounds;
        let south = south.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let north = north.clamp(-MAX_LATITUDE, MAX_LATITUDE);

        let dx = (east - west) / 360.0;
        let dy = (mercator_y(south) - mercator_y(north)).abs();
        let zoom = if dx <= 0.0 && dy <= 0.0 {
            POINT_ZOOM
        } else {
            let zx = if dx > 0.0 { (VIEW_WIDTH / (TILE_SIZE * dx)).log2() } else { f64::MAX };
            let zy = if dy > 0.0 { (VIEW_HEIGHT / (TILE_SIZE * dy)).log2() } else { f64::MAX };
            zx.min(zy).floor().clamp(MIN_ZOOM as f64, MAX_ZOOM as f64) as u8
        };

        MapView {
            center_lat: (south + north) / 2.0,
            center_lon: (west + east) / 2.0,
            zoom,
            bounds: Some(bounds),
        }
    }
}

/// Normalized Web Mercator y: 0 at the northern limit, 1 at the southern.
fn mercator_y(lat: f64) -> f64 {
    let lat = lat.to_radians();
    (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0
}

/// A finished map document.
#[derive(Debug, Clone, Serialize)]
pub struct MapArtifact {
    /// The standalone HTML document.
    pub html: String,
    /// Initial view.
    pub view: MapView,
    /// Overlays, bottom to top.
    pub layers: Vec<MapLayer>,
}

// ============================================================================
// Builder
// ============================================================================

struct PendingOverlay {
    image: Image,
    params: VisualizationParams,
}

/// Composes a map from overlays and an outline.
///
/// Inputs are decoded and checked as they are added; the remote service is only
/// contacted by [`MapBuilder::build`].
pub struct MapBuilder<'a> {
    pipeline: &'a Pipeline,
    title: String,
    overlays: Vec<(SerializedHandle, VisualizationParams)>,
    outline: Option<SerializedHandle>,
}

impl<'a> MapBuilder<'a> {
    /// Start an empty map.
    pub fn new(pipeline: &'a Pipeline) -> Self {
        MapBuilder {
            pipeline,
            title: DEFAULT_TITLE.to_string(),
            overlays: Vec::new(),
            outline: None,
        }
    }

    /// Set the document title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Add an image overlay on top of those already added.
    pub fn overlay(mut self, image: SerializedHandle, params: VisualizationParams) -> Self {
        self.overlays.push((image, params));
        self
    }

    /// Outline a geometry and frame the view on it.
    pub fn outline(mut self, geometry: SerializedHandle) -> Self {
        self.outline = Some(geometry);
        self
    }

    /// Render every overlay remotely and assemble the document.
    pub fn build(self) -> Result<MapArtifact> {
        let pipeline = self.pipeline;
        pipeline.run("build_map", || {
            let pending = self
                .overlays
                .iter()
                .map(|(handle, params)| {
                    let image = handle
                        .decode::<Image>()
                        .map_err(|e| OpsError::Render(format!("image: {}", e)))?;
                    Ok(PendingOverlay {
                        image,
                        params: params.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let outline = self
                .outline
                .as_ref()
                .map(|handle| {
                    handle
                        .decode::<Geometry>()
                        .map_err(|e| OpsError::Render(format!("geometry: {}", e)))
                })
                .transpose()?;

            let resolved = pending
                .iter()
                .enumerate()
                .map(|(i, overlay)| resolve(pipeline, i, overlay))
                .collect::<Result<Vec<_>>>()?;

            let mut layers = Vec::with_capacity(resolved.len());
            for (overlay, style) in pending.iter().zip(resolved) {
                let vis = VisualizationOptions::new(
                    style.min,
                    style.max,
                    style.palette.iter().map(HexColor::to_rrggbb).collect(),
                );
                let tiles = pipeline
                    .gateway()
                    .create_map(overlay.image.node(), &vis)
                    .map_err(|source| OpsError::RemoteCompute {
                        operation: "build_map",
                        source,
                    })?;
                debug!(layer = %style.name, map = %tiles.map_name, "overlay registered");
                layers.push(MapLayer {
                    tile_url: tiles.url_template,
                    ..style
                });
            }

            let (view, outline_geojson) = match outline {
                Some(geometry) => {
                    let geojson = pipeline
                        .gateway()
                        .compute_value(geometry.node())
                        .map_err(|source| OpsError::RemoteCompute {
                            operation: "build_map",
                            source,
                        })?;
                    let bounds = geojson_bounds(&geojson).ok_or_else(|| {
                        OpsError::Render("outline geometry has no coordinates".to_string())
                    })?;
                    (MapView::fit(bounds), Some(geojson))
                }
                None => (MapView::global(), None),
            };

            let html = html::render(&self.title, &view, &layers, outline_geojson.as_ref())?;
            Ok(MapArtifact { html, view, layers })
        })
    }
}

fn require_finite_bound(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(OpsError::validation(
            "vis_params",
            format!("{} must be a finite number, got {}", name, value),
        ))
    }
}

/// Display range from the given bounds, filling a missing bound from the other one.
///
/// Only a pair given in full can be inconsistent. Without bounds the range is
/// `[0, threshold]`, or `[0, 1]` for images without a dataset threshold.
fn display_range(params: &VisualizationParams, threshold: Option<f64>) -> Result<(f64, f64)> {
    let below = |max: f64| if max > 0.0 { 0.0 } else { max - 1.0 };
    match (params.min, params.max) {
        (Some(min), Some(max)) => {
            let min = require_finite_bound("min", min)?;
            let max = require_finite_bound("max", max)?;
            if min >= max {
                return Err(OpsError::validation(
                    "vis_params",
                    format!("min ({}) must be below max ({})", min, max),
                ));
            }
            Ok((min, max))
        }
        (Some(min), None) => {
            let min = require_finite_bound("min", min)?;
            let max = match threshold {
                Some(t) if t.is_finite() && t > min => t,
                _ if min < 1.0 && min >= 0.0 => 1.0,
                _ => (min + min.abs().max(1.0)).min(f64::MAX),
            };
            Ok((min, max))
        }
        (None, Some(max)) => {
            let max = require_finite_bound("max", max)?;
            Ok((below(max), max))
        }
        (None, None) => {
            let max = threshold.filter(|t| t.is_finite()).unwrap_or(1.0);
            Ok((below(max), max))
        }
    }
}

/// Fill the gaps in an overlay's parameters from its dataset, then check them.
fn resolve(pipeline: &Pipeline, index: usize, overlay: &PendingOverlay) -> Result<MapLayer> {
    let params = &overlay.params;
    let dataset: Option<&DatasetDescriptor> = overlay
        .image
        .node()
        .referenced_assets()
        .iter()
        .find_map(|asset| pipeline.catalog().find_by_asset(asset));

    let (min, max) = display_range(params, dataset.and_then(|d| d.threshold))?;

    let opacity = params.opacity.unwrap_or(DEFAULT_OPACITY);
    if !(0.0..=1.0).contains(&opacity) {
        return Err(OpsError::validation(
            "vis_params",
            format!("opacity must be within [0, 1], got {}", opacity),
        ));
    }

    let palette = match (&params.palette, dataset) {
        (Some(colors), _) if !colors.is_empty() => colors
            .iter()
            .map(|c| {
                HexColor::parse(c).ok_or_else(|| {
                    OpsError::validation("vis_params", format!("invalid palette color '{}'", c))
                })
            })
            .collect::<Result<Vec<_>>>()?,
        (_, Some(d)) => d.color_palette.clone(),
        _ => GRAYSCALE.iter().filter_map(|c| HexColor::parse(c)).collect(),
    };

    let name = params
        .name
        .clone()
        .or_else(|| dataset.map(|d| d.id.clone()))
        .unwrap_or_else(|| format!("layer {}", index + 1));

    Ok(MapLayer {
        name,
        tile_url: String::new(),
        min,
        max,
        palette,
        opacity,
        dataset: dataset.map(|d| d.id.clone()),
        source_name: dataset.map(|d| d.source_name.clone()),
        source_url: dataset.map(|d| d.source_url.clone()),
    })
}

/// `[west, south, east, north]` over every coordinate pair in a GeoJSON value.
pub fn geojson_bounds(geojson: &Value) -> Option<[f64; 4]> {
    let mut bounds: Option<[f64; 4]> = None;
    collect_bounds(geojson, &mut bounds);
    bounds
}

fn collect_bounds(value: &Value, bounds: &mut Option<[f64; 4]>) {
    match value {
        Value::Array(items) => {
            if let [Value::Number(x), Value::Number(y), ..] = items.as_slice() {
                if let (Some(lon), Some(lat)) = (x.as_f64(), y.as_f64()) {
                    let b = bounds.get_or_insert([lon, lat, lon, lat]);
                    b[0] = b[0].min(lon);
                    b[1] = b[1].min(lat);
                    b[2] = b[2].max(lon);
                    b[3] = b[3].max(lat);
                }
                return;
            }
            for item in items {
                collect_bounds(item, bounds);
            }
        }
        Value::Object(map) => {
            for key in ["coordinates", "geometries", "geometry", "features"] {
                if let Some(inner) = map.get(key) {
                    collect_bounds(inner, bounds);
                }
            }
        }
        _ => {}
    }
}

impl Pipeline {
    /// Render one image over an optional outline geometry.
    pub fn build_map(
        &self,
        image: &SerializedHandle,
        geometry: Option<&SerializedHandle>,
        params: VisualizationParams,
    ) -> Result<MapArtifact> {
        let mut builder = MapBuilder::new(self).overlay(image.clone(), params);
        if let Some(geometry) = geometry {
            builder = builder.outline(geometry.clone());
        }
        builder.build()
    }
}
