//! Test support: an in-memory gateway that evaluates expressions locally.
//!
//! Rasters are 20 x 20 grids of 1 degree cells covering longitude and latitude
//! -10..10. Geometries are axis-aligned rectangles; buffering converts meters to
//! degrees at 111 320 m per degree. Every gateway call is counted so tests can
//! assert that validation happens before anything goes remote.

#![allow(dead_code)]

use ee_expr::{Node, Remote, SerializedHandle};
use geohaz_catalog::Catalog;
use geohaz_gateway::{
    AssetInfo, ComputeGateway, GatewayError, Result, TileSource, VisualizationOptions,
};
use geohaz_ops::{Pipeline, PipelineSettings};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const GRID: usize = 20;
pub const ORIGIN: f64 = -10.0;
pub const METERS_PER_DEGREE: f64 = 111_320.0;

pub const BASE: &str = "projects/test/assets";
pub const RIVER_FLOOD: &str = "projects/test/assets/river_flood";
pub const DROUGHT: &str = "projects/test/assets/drought";
pub const POPULATION: &str = "projects/test/assets/population";
pub const COUNTRIES: &str = "projects/test/assets/adm0_wfp";
pub const ADMIN1: &str = "projects/test/assets/adm1_wfp";

pub const CATALOG: &str = r##"
datasets:
  river_flood:
    asset_id: river_flood
    image_filename: river_flood.tif
    description: Riverine flood depth
    mosaic: false
    source_name: JRC
    source_url: https://data.jrc.ec.europa.eu/
    color_palette: ["#f7fbff", "#c6dbef", "#6baed6", "#2171b5", "#08306b"]
    threshold: 0.01
  drought:
    asset_id: drought
    image_filename: drought.tif
    description: Drought frequency
    mosaic: false
    source_name: FAO
    source_url: https://www.fao.org/
    color_palette: ["#ffffcc", "#800026"]
    threshold: 30
    valid_max: 100
  population:
    asset_id: population
    image_filename: population.tif
    description: Child population
    mosaic: true
    source_name: WorldPop
    source_url: https://www.worldpop.org/
    color_palette: ["#fff", "#000"]
"##;

// ============================================================================
// Values
// ============================================================================

/// Cell values, row-major from the south-west corner. `None` is masked.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster(pub Vec<Option<f64>>);

impl Raster {
    pub fn from_fn(f: impl Fn(f64, f64) -> Option<f64>) -> Self {
        let mut cells = Vec::with_capacity(GRID * GRID);
        for row in 0..GRID {
            for col in 0..GRID {
                let (lon, lat) = cell_center(row, col);
                cells.push(f(lon, lat));
            }
        }
        Raster(cells)
    }

    pub fn constant(value: f64) -> Self {
        Raster(vec![Some(value); GRID * GRID])
    }

    /// Value of the cell containing a point.
    pub fn at(&self, lon: f64, lat: f64) -> Option<f64> {
        let col = ((lon - ORIGIN).floor() as usize).min(GRID - 1);
        let row = ((lat - ORIGIN).floor() as usize).min(GRID - 1);
        self.0[row * GRID + col]
    }

    pub fn count_where(&self, f: impl Fn(Option<f64>) -> bool) -> usize {
        self.0.iter().filter(|v| f(**v)).count()
    }

    fn zip(&self, other: &Raster, f: impl Fn(Option<f64>, Option<f64>) -> Option<f64>) -> Raster {
        Raster(self.0.iter().zip(&other.0).map(|(a, b)| f(*a, *b)).collect())
    }

    fn map(&self, f: impl Fn(Option<f64>) -> Option<f64>) -> Raster {
        Raster(self.0.iter().map(|v| f(*v)).collect())
    }

    fn cells(&self) -> impl Iterator<Item = (f64, f64, Option<f64>)> + '_ {
        self.0.iter().enumerate().map(|(i, v)| {
            let (lon, lat) = cell_center(i / GRID, i % GRID);
            (lon, lat, *v)
        })
    }
}

fn cell_center(row: usize, col: usize) -> (f64, f64) {
    (ORIGIN + col as f64 + 0.5, ORIGIN + row as f64 + 0.5)
}

/// An axis-aligned rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Rect {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Rect { west, south, east, north }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    /// The overlap, which may be degenerate when the rectangles only touch.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::new(
            self.west.max(other.west),
            self.south.max(other.south),
            self.east.min(other.east),
            self.north.min(other.north),
        );
        (r.west <= r.east && r.south <= r.north).then_some(r)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.west.min(other.west),
            self.south.min(other.south),
            self.east.max(other.east),
            self.north.max(other.north),
        )
    }

    pub fn area_m2(&self) -> f64 {
        (self.east - self.west) * (self.north - self.south) * METERS_PER_DEGREE * METERS_PER_DEGREE
    }

    fn buffer(&self, meters: f64) -> Option<Rect> {
        let d = meters / METERS_PER_DEGREE;
        let r = Rect::new(self.west - d, self.south - d, self.east + d, self.north + d);
        (r.west < r.east && r.south < r.north).then_some(r)
    }

    fn geojson(&self) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [self.west, self.south], [self.east, self.south], [self.east, self.north],
                [self.west, self.north], [self.west, self.south]
            ]]
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Rect>,
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(rect: Rect, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Feature {
            geometry: Some(rect),
            properties,
        }
    }

    fn geojson(&self) -> Value {
        json!({
            "type": "Feature",
            "geometry": self.geometry.map(|r| r.geojson()),
            "properties": self.properties,
        })
    }
}

#[derive(Debug, Clone)]
enum Filter {
    Equals(String, Value),
    Intersects(Option<Rect>),
    GreaterThan(String, f64),
}

impl Filter {
    fn keeps(&self, feature: &Feature) -> bool {
        match self {
            Filter::Equals(field, value) => feature.properties.get(field) == Some(value),
            Filter::Intersects(rect) => match (feature.geometry, rect) {
                (Some(a), Some(b)) => a.intersect(b).is_some(),
                _ => false,
            },
            Filter::GreaterThan(field, bound) => feature
                .properties
                .get(field)
                .and_then(Value::as_f64)
                .is_some_and(|v| v > *bound),
        }
    }
}

#[derive(Debug, Clone)]
enum Val {
    Json(Value),
    List(Vec<Val>),
    Image(Raster),
    Geometry(Option<Rect>),
    Feature(Feature),
    Collection(Vec<Feature>),
    Nested(Vec<Vec<Feature>>),
    Reducer(String),
    Filter(Filter),
    Function(String, Node),
}

type EvalResult<T> = std::result::Result<T, String>;

// ============================================================================
// Evaluator
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Assets {
    pub images: HashMap<String, Raster>,
    pub collections: HashMap<String, Raster>,
    pub tables: HashMap<String, Vec<Feature>>,
}

impl Assets {
    pub fn standard() -> Self {
        let mut assets = Assets::default();
        // Depth 0.0, 0.1, ... 0.9 east of the meridian; dry land to the west is masked.
        assets.images.insert(
            RIVER_FLOOD.to_string(),
            Raster::from_fn(|lon, _| (lon > 0.0).then(|| (lon - 0.5) / 10.0)),
        );
        // 10 * lat + 50, so rows north of 5N exceed 100.
        assets.images.insert(
            DROUGHT.to_string(),
            Raster::from_fn(|_, lat| Some(10.0 * lat + 50.0)),
        );
        assets.collections.insert(POPULATION.to_string(), Raster::constant(1.0));
        assets.tables.insert(
            COUNTRIES.to_string(),
            vec![
                Feature::new(
                    Rect::new(0.0, -5.0, 5.0, 5.0),
                    json!({"iso3": "KEN", "name": "Kenya"}),
                ),
                Feature::new(
                    Rect::new(-5.0, -5.0, 0.0, 5.0),
                    json!({"iso3": "UGA", "name": "Uganda"}),
                ),
            ],
        );
        assets.tables.insert(
            ADMIN1.to_string(),
            vec![
                Feature::new(Rect::new(0.0, 0.0, 5.0, 5.0), json!({"adm1_code": 101})),
                Feature::new(Rect::new(0.0, -5.0, 5.0, 0.0), json!({"adm1_code": 102})),
            ],
        );
        assets
    }

    fn has(&self, id: &str) -> bool {
        self.images.contains_key(id)
            || self.collections.contains_key(id)
            || self.tables.contains_key(id)
    }
}

struct Evaluator<'a> {
    assets: &'a Assets,
    scope: Vec<(String, Val)>,
}

fn arg<'v>(args: &'v BTreeMap<String, Val>, name: &str) -> EvalResult<&'v Val> {
    args.get(name).ok_or_else(|| format!("missing argument '{}'", name))
}

fn number(v: &Val) -> EvalResult<f64> {
    match v {
        Val::Json(Value::Number(n)) => n.as_f64().ok_or_else(|| "bad number".to_string()),
        other => Err(format!("expected a number, got {:?}", other)),
    }
}

fn string(v: &Val) -> EvalResult<String> {
    match v {
        Val::Json(Value::String(s)) => Ok(s.clone()),
        other => Err(format!("expected a string, got {:?}", other)),
    }
}

fn image(v: &Val) -> EvalResult<&Raster> {
    match v {
        Val::Image(r) => Ok(r),
        other => Err(format!("expected an image, got {:?}", other)),
    }
}

fn geometry(v: &Val) -> EvalResult<Option<Rect>> {
    match v {
        Val::Geometry(g) => Ok(*g),
        other => Err(format!("expected a geometry, got {:?}", other)),
    }
}

fn feature(v: &Val) -> EvalResult<Feature> {
    match v {
        Val::Feature(f) => Ok(f.clone()),
        other => Err(format!("expected a feature, got {:?}", other)),
    }
}

fn features(v: &Val) -> EvalResult<Vec<Feature>> {
    match v {
        Val::Collection(fs) => Ok(fs.clone()),
        other => Err(format!("expected a collection, got {:?}", other)),
    }
}

fn truthy(v: f64) -> bool {
    v != 0.0
}

fn bool_cell(b: bool) -> Option<f64> {
    Some(if b { 1.0 } else { 0.0 })
}

fn rect_from(value: &Value) -> EvalResult<Rect> {
    let coords: Vec<f64> = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    match coords.as_slice() {
        [w, s, e, n] => Ok(Rect::new(*w, *s, *e, *n)),
        _ => Err("rectangle needs four coordinates".to_string()),
    }
}

fn polygon_bbox(value: &Value) -> EvalResult<Rect> {
    let rings: Vec<Vec<[f64; 2]>> =
        serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    let mut points = rings.iter().flatten();
    let first = points.next().ok_or("empty polygon")?;
    Ok(points.fold(Rect::new(first[0], first[1], first[0], first[1]), |r, p| {
        r.union(&Rect::new(p[0], p[1], p[0], p[1]))
    }))
}

fn reduce(reducer: &str, values: &[f64]) -> Option<f64> {
    if reducer == "Reducer.count" {
        return Some(values.len() as f64);
    }
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    match reducer {
        "Reducer.sum" => Some(values.iter().sum()),
        "Reducer.mean" => Some(mean),
        "Reducer.max" => values.iter().copied().reduce(f64::max),
        "Reducer.min" => values.iter().copied().reduce(f64::min),
        "Reducer.median" => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let mid = sorted.len() / 2;
            Some(if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            })
        }
        "Reducer.stdDev" => {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            Some(variance.sqrt())
        }
        _ => None,
    }
}

impl<'a> Evaluator<'a> {
    fn new(assets: &'a Assets) -> Self {
        Evaluator { assets, scope: Vec::new() }
    }

    fn eval(&mut self, node: &Node) -> EvalResult<Val> {
        match node {
            Node::Constant(v) => Ok(Val::Json(v.clone())),
            Node::Array(items) => Ok(Val::List(
                items.iter().map(|n| self.eval(n)).collect::<EvalResult<Vec<_>>>()?,
            )),
            Node::Dictionary(_) => Err("dictionaries are not supported".to_string()),
            Node::Argument(name) => self
                .scope
                .iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| format!("unbound argument '{}'", name)),
            Node::Function(def) => {
                let name = def.argument_names.first().cloned().ok_or("lambda without arguments")?;
                Ok(Val::Function(name, (*def.body).clone()))
            }
            Node::Invocation(inv) => {
                let mut args = BTreeMap::new();
                for (name, value) in &inv.arguments {
                    args.insert(name.clone(), self.eval(value)?);
                }
                self.invoke(&inv.function_name, &args)
            }
        }
    }

    fn apply(&mut self, function: &Val, input: Val) -> EvalResult<Val> {
        let Val::Function(name, body) = function else {
            return Err("expected a function".to_string());
        };
        self.scope.push((name.clone(), input));
        let result = self.eval(body);
        self.scope.pop();
        result
    }

    fn invoke(&mut self, name: &str, args: &BTreeMap<String, Val>) -> EvalResult<Val> {
        let compare = |f: fn(f64, f64) -> bool| -> EvalResult<Val> {
            let a = image(arg(args, "image1")?)?;
            let b = image(arg(args, "image2")?)?;
            Ok(Val::Image(a.zip(b, |x, y| match (x, y) {
                (Some(x), Some(y)) => bool_cell(f(x, y)),
                _ => None,
            })))
        };

        match name {
            "Image.load" => {
                let id = string(arg(args, "id")?)?;
                self.assets
                    .images
                    .get(&id)
                    .map(|r| Val::Image(r.clone()))
                    .ok_or_else(|| format!("Image asset '{}' not found", id))
            }
            "ImageCollection.load" => {
                let id = string(arg(args, "id")?)?;
                self.assets
                    .collections
                    .get(&id)
                    .map(|r| Val::Image(r.clone()))
                    .ok_or_else(|| format!("ImageCollection asset '{}' not found", id))
            }
            "ImageCollection.mosaic" => Ok(arg(args, "collection")?.clone()),
            "Image.constant" => Ok(Val::Image(Raster::constant(number(arg(args, "value")?)?))),
            "Image.gt" => compare(|a, b| a > b),
            "Image.gte" => compare(|a, b| a >= b),
            "Image.lt" => compare(|a, b| a < b),
            "Image.lte" => compare(|a, b| a <= b),
            "Image.eq" => compare(|a, b| a == b),
            "Image.or" | "Image.and" => {
                let a = image(arg(args, "image1")?)?;
                let b = image(arg(args, "image2")?)?;
                let both = name == "Image.and";
                Ok(Val::Image(a.zip(b, |x, y| match (x, y) {
                    (Some(x), Some(y)) if both => bool_cell(truthy(x) && truthy(y)),
                    (Some(x), Some(y)) => bool_cell(truthy(x) || truthy(y)),
                    _ => None,
                })))
            }
            "Image.unmask" => {
                let input = image(arg(args, "input")?)?;
                let value = number(arg(args, "value")?)?;
                Ok(Val::Image(input.map(|v| v.or(Some(value)))))
            }
            "Image.clip" => {
                let input = image(arg(args, "input")?)?;
                let region = geometry(arg(args, "geometry")?)?;
                Ok(Val::Image(Raster(
                    input
                        .cells()
                        .map(|(lon, lat, v)| {
                            v.filter(|_| region.is_some_and(|r| r.contains(lon, lat)))
                        })
                        .collect(),
                )))
            }
            "Image.updateMask" => {
                let input = image(arg(args, "image")?)?;
                let mask = image(arg(args, "mask")?)?;
                Ok(Val::Image(input.zip(mask, |v, m| match m {
                    Some(m) if truthy(m) => v,
                    _ => None,
                })))
            }
            "Image.reduceRegion" => {
                let input = image(arg(args, "image")?)?;
                let region = geometry(arg(args, "geometry")?)?;
                let Val::Reducer(reducer) = arg(args, "reducer")? else {
                    return Err("expected a reducer".to_string());
                };
                let values: Vec<f64> = input
                    .cells()
                    .filter(|(lon, lat, _)| region.is_some_and(|r| r.contains(*lon, *lat)))
                    .filter_map(|(_, _, v)| v)
                    .collect();
                Ok(Val::Json(json!({ "b1": reduce(reducer, &values) })))
            }
            n if n.starts_with("Reducer.") => Ok(Val::Reducer(n.to_string())),
            "ErrorMargin" => Ok(Val::Json(Value::Null)),

            "GeometryConstructors.Rectangle" => match arg(args, "coordinates")? {
                Val::Json(v) => Ok(Val::Geometry(Some(rect_from(v)?))),
                _ => Err("bad rectangle".to_string()),
            },
            "GeometryConstructors.Polygon" => match arg(args, "coordinates")? {
                Val::Json(v) => Ok(Val::Geometry(Some(polygon_bbox(v)?))),
                _ => Err("bad polygon".to_string()),
            },
            "Geometry.buffer" => {
                let g = geometry(arg(args, "geometry")?)?;
                let d = number(arg(args, "distance")?)?;
                Ok(Val::Geometry(g.and_then(|r| r.buffer(d))))
            }
            "Geometry.simplify" => Ok(Val::Geometry(geometry(arg(args, "geometry")?)?)),
            "Geometry.intersection" => {
                let a = geometry(arg(args, "left")?)?;
                let b = geometry(arg(args, "right")?)?;
                Ok(Val::Geometry(a.zip(b).and_then(|(a, b)| a.intersect(&b))))
            }
            "Geometry.area" => {
                let g = geometry(arg(args, "geometry")?)?;
                Ok(Val::Json(json!(g.map_or(0.0, |r| r.area_m2()))))
            }

            "Feature" => {
                let geometry = geometry(arg(args, "geometry")?)?;
                let properties = match args.get("metadata") {
                    Some(Val::Json(Value::Object(map))) => map.clone(),
                    _ => Map::new(),
                };
                Ok(Val::Feature(Feature { geometry, properties }))
            }
            "Feature.geometry" => Ok(Val::Geometry(feature(arg(args, "feature")?)?.geometry)),
            "Feature.intersection" => {
                let a = feature(arg(args, "left")?)?;
                let b = feature(arg(args, "right")?)?;
                Ok(Val::Feature(Feature {
                    geometry: a.geometry.zip(b.geometry).and_then(|(x, y)| x.intersect(&y)),
                    properties: a.properties,
                }))
            }
            "Element.copyProperties" => {
                let mut destination = feature(arg(args, "destination")?)?;
                let source = feature(arg(args, "source")?)?;
                destination.properties.extend(source.properties);
                Ok(Val::Feature(destination))
            }
            "Element.set" => {
                let mut object = feature(arg(args, "object")?)?;
                let key = string(arg(args, "key")?)?;
                let Val::Json(value) = arg(args, "value")? else {
                    return Err("property values must be plain".to_string());
                };
                object.properties.insert(key, value.clone());
                Ok(Val::Feature(object))
            }

            "Collection" => match arg(args, "features")? {
                Val::List(items) => Ok(Val::Collection(
                    items.iter().map(feature).collect::<EvalResult<_>>()?,
                )),
                _ => Err("features must be a list".to_string()),
            },
            "Collection.loadTable" => {
                let id = string(arg(args, "tableId")?)?;
                self.assets
                    .tables
                    .get(&id)
                    .map(|t| Val::Collection(t.clone()))
                    .ok_or_else(|| format!("Table '{}' not found", id))
            }
            "Collection.merge" => {
                let mut a = features(arg(args, "collection1")?)?;
                a.extend(features(arg(args, "collection2")?)?);
                Ok(Val::Collection(a))
            }
            "Collection.filter" => {
                let fs = features(arg(args, "collection")?)?;
                let Val::Filter(filter) = arg(args, "filter")? else {
                    return Err("expected a filter".to_string());
                };
                Ok(Val::Collection(fs.into_iter().filter(|f| filter.keeps(f)).collect()))
            }
            "Filter.equals" => Ok(Val::Filter(Filter::Equals(
                string(arg(args, "leftField")?)?,
                match arg(args, "rightValue")? {
                    Val::Json(v) => v.clone(),
                    _ => return Err("bad filter value".to_string()),
                },
            ))),
            "Filter.intersects" => Ok(Val::Filter(Filter::Intersects(geometry(arg(
                args,
                "rightValue",
            )?)?))),
            "Filter.greaterThan" => Ok(Val::Filter(Filter::GreaterThan(
                string(arg(args, "leftField")?)?,
                number(arg(args, "rightValue")?)?,
            ))),
            "Collection.map" => {
                let fs = features(arg(args, "collection")?)?;
                let function = arg(args, "baseAlgorithm")?.clone();
                let mut singles = Vec::new();
                let mut nested = Vec::new();
                for f in fs {
                    match self.apply(&function, Val::Feature(f))? {
                        Val::Feature(out) => singles.push(out),
                        Val::Collection(out) => nested.push(out),
                        other => return Err(format!("map produced {:?}", other)),
                    }
                }
                if nested.is_empty() {
                    Ok(Val::Collection(singles))
                } else {
                    Ok(Val::Nested(nested))
                }
            }
            "Collection.flatten" => match arg(args, "collection")? {
                Val::Nested(groups) => Ok(Val::Collection(groups.concat())),
                Val::Collection(fs) if fs.is_empty() => Ok(Val::Collection(Vec::new())),
                _ => Err("flatten needs a collection of collections".to_string()),
            },
            "Collection.geometry" => {
                let fs = features(arg(args, "collection")?)?;
                Ok(Val::Geometry(
                    fs.iter().filter_map(|f| f.geometry).reduce(|a, b| a.union(&b)),
                ))
            }
            other => Err(format!("unknown function {}", other)),
        }
    }
}

fn to_json(value: Val) -> EvalResult<Value> {
    match value {
        Val::Json(v) => Ok(v),
        Val::Geometry(Some(r)) => Ok(r.geojson()),
        Val::Geometry(None) => Ok(json!({"type": "Polygon", "coordinates": []})),
        Val::Feature(f) => Ok(f.geojson()),
        Val::Collection(fs) => Ok(json!({
            "type": "FeatureCollection",
            "features": fs.iter().map(Feature::geojson).collect::<Vec<_>>(),
        })),
        other => Err(format!("cannot compute a value for {:?}", other)),
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// A gateway that evaluates expressions against [`Assets`] and counts calls.
#[derive(Debug, Default)]
pub struct FakeGateway {
    pub assets: Assets,
    compute_calls: AtomicUsize,
    map_calls: AtomicUsize,
    asset_calls: AtomicUsize,
    /// When set, every call fails with this HTTP status.
    fail_status: Mutex<Option<u16>>,
    /// Visualization options received by `create_map`, in order.
    pub rendered: Mutex<Vec<VisualizationOptions>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        FakeGateway {
            assets: Assets::standard(),
            ..Default::default()
        }
    }

    pub fn fail_with(&self, status: u16) {
        *self.fail_status.lock().unwrap() = Some(status);
    }

    pub fn calls(&self) -> usize {
        self.compute_calls() + self.map_calls() + self.asset_calls()
    }

    pub fn compute_calls(&self) -> usize {
        self.compute_calls.load(Ordering::SeqCst)
    }

    pub fn map_calls(&self) -> usize {
        self.map_calls.load(Ordering::SeqCst)
    }

    pub fn asset_calls(&self) -> usize {
        self.asset_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<()> {
        match *self.fail_status.lock().unwrap() {
            Some(status) => Err(GatewayError::Api {
                status,
                reason: "RESOURCE_EXHAUSTED".to_string(),
                message: "quota exceeded".to_string(),
            }),
            None => Ok(()),
        }
    }

    fn eval(&self, node: &Node) -> EvalResult<Val> {
        Evaluator::new(&self.assets).eval(node)
    }

    /// Evaluate an image handle without counting a call.
    pub fn image(&self, handle: &SerializedHandle) -> Raster {
        match self.eval(handle.node()) {
            Ok(Val::Image(r)) => r,
            other => panic!("not an image: {:?}", other),
        }
    }

    /// Evaluate a geometry handle without counting a call.
    pub fn geometry(&self, handle: &SerializedHandle) -> Option<Rect> {
        match self.eval(handle.node()) {
            Ok(Val::Geometry(g)) => g,
            other => panic!("not a geometry: {:?}", other),
        }
    }

    /// Evaluate a feature collection handle without counting a call.
    pub fn features(&self, handle: &SerializedHandle) -> Vec<Feature> {
        match self.eval(handle.node()) {
            Ok(Val::Collection(fs)) => fs,
            other => panic!("not a collection: {:?}", other),
        }
    }
}

fn invalid(message: String) -> GatewayError {
    GatewayError::Api {
        status: 400,
        reason: "INVALID_ARGUMENT".to_string(),
        message,
    }
}

impl ComputeGateway for FakeGateway {
    fn compute_value(&self, expression: &Node) -> Result<Value> {
        self.compute_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.eval(expression).and_then(to_json).map_err(invalid)
    }

    fn create_map(&self, image: &Node, vis: &VisualizationOptions) -> Result<TileSource> {
        let n = self.map_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        match self.eval(image).map_err(invalid)? {
            Val::Image(_) => {}
            other => return Err(invalid(format!("not an image: {:?}", other))),
        }
        self.rendered.lock().unwrap().push(vis.clone());
        let map_name = format!("projects/test/maps/map-{}", n);
        Ok(TileSource {
            url_template: format!("https://fake.test/v1/{}/tiles/{{z}}/{{x}}/{{y}}", map_name),
            map_name,
        })
    }

    fn get_asset(&self, asset_id: &str) -> Result<AssetInfo> {
        self.asset_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        if self.assets.has(asset_id) {
            Ok(AssetInfo {
                name: asset_id.to_string(),
                id: asset_id.to_string(),
                asset_type: "IMAGE".to_string(),
            })
        } else {
            Err(GatewayError::Api {
                status: 404,
                reason: "NOT_FOUND".to_string(),
                message: format!("Asset '{}' not found.", asset_id),
            })
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_yaml_str(CATALOG, BASE).unwrap())
}

/// A pipeline over the standard assets, with the gateway for inspection.
pub fn pipeline() -> (Pipeline, Arc<FakeGateway>) {
    pipeline_with(FakeGateway::new())
}

pub fn pipeline_with(gateway: FakeGateway) -> (Pipeline, Arc<FakeGateway>) {
    let gateway = Arc::new(gateway);
    let pipeline = Pipeline::new(gateway.clone(), catalog(), PipelineSettings::default());
    (pipeline, gateway)
}

pub fn rectangle(west: f64, south: f64, east: f64, north: f64) -> SerializedHandle {
    ee_expr::Geometry::rectangle(west, south, east, north).encode()
}

pub fn collection(features: &[(Rect, Value)]) -> SerializedHandle {
    ee_expr::FeatureCollection::from_features(features.iter().map(|(r, props)| {
        let props = match props {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        (ee_expr::Geometry::rectangle(r.west, r.south, r.east, r.north), props)
    }))
    .encode()
}
