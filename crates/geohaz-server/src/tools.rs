//! The tool surface: named operations over JSON arguments.
//!
//! A request is `{"tool": "<name>", "arguments": {...}}`. Handles travel as
//! strings holding the serialized expression (a JSON object is accepted too and
//! re-serialized). Every response echoes the arguments it was called with:
//!
//! ```json
//! {"ok": true, "result": {"image_json": "..."}, "input_arguments": {...}}
//! {"ok": false,
//!  "error": {"category": "validation", "kind": "ValidationError", "message": "..."},
//!  "input_arguments": {...}}
//! ```

use ee_expr::{Comparison, ParseLiteralError, Reducer, SerializedHandle};
use geohaz_ops::{AreaType, MapBuilder, OpsError, Pipeline, Result, VisualizationParams};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

/// Every tool name, in the order they are listed to clients.
pub const TOOLS: &[&str] = &[
    "get_all_datasets_and_metadata",
    "get_dataset_image_and_metadata",
    "mask_image",
    "mask_image_with_image",
    "filter_image_by_threshold",
    "union_binary_images",
    "intersect_binary_images",
    "intersect_feature_collections",
    "merge_feature_collections",
    "reduce_image",
    "get_zone_of_area",
    "get_admin_boundary",
    "collection_geometry",
    "verify_handle",
    "build_map",
];

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetArgs {
    dataset: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MaskArgs {
    image_json: Value,
    geometry_json: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MaskWithImageArgs {
    image_json: Value,
    mask_image_json: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ThresholdArgs {
    image_json: Value,
    threshold: f64,
    #[serde(default)]
    comparison: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImagesArgs {
    images_json: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CollectionPairArgs {
    collection1_json: Value,
    collection2_json: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CollectionsArgs {
    collections_json: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReduceArgs {
    image_json: Value,
    geometry_json: Value,
    reducer: String,
    #[serde(default)]
    scale: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ZoneArgs {
    geometry_json: Value,
    buffer_distance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BoundaryArgs {
    code: String,
    area_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CollectionArgs {
    collection_json: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VerifyArgs {
    handle_json: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MapArgs {
    image_json: Value,
    #[serde(default)]
    geometry_json: Option<Value>,
    #[serde(default)]
    vis_params: VisualizationParams,
    #[serde(default)]
    title: Option<String>,
}

fn parse_args<T: DeserializeOwned>(arguments: &Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other.clone(),
    };
    serde_json::from_value(arguments).map_err(|e| OpsError::validation("arguments", e.to_string()))
}

fn handle(parameter: &'static str, value: &Value) -> Result<SerializedHandle> {
    let parsed = match value {
        Value::String(token) => SerializedHandle::parse(token),
        Value::Object(_) => SerializedHandle::parse(&value.to_string()),
        _ => {
            return Err(OpsError::Deserialization {
                parameter,
                message: "expected a serialized expression".to_string(),
            })
        }
    };
    parsed.map_err(|e| OpsError::from_codec(parameter, e))
}

/// Map inputs that cannot be decoded are render failures.
fn map_input(parameter: &'static str, value: &Value) -> Result<SerializedHandle> {
    handle(parameter, value).map_err(|e| match e {
        OpsError::Deserialization { message, .. } => {
            OpsError::Render(format!("{}: {}", parameter, message))
        }
        other => OpsError::Render(format!("{}: {}", parameter, other)),
    })
}

fn handles(parameter: &'static str, values: &[Value]) -> Result<Vec<SerializedHandle>> {
    values.iter().map(|v| handle(parameter, v)).collect()
}

fn literal<T>(parameter: &'static str, text: &str) -> Result<T>
where
    T: FromStr<Err = ParseLiteralError>,
{
    text.parse().map_err(|e| OpsError::from_literal(parameter, e))
}

// ============================================================================
// Server
// ============================================================================

/// Dispatches tool calls to a [`Pipeline`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ToolServer {
    pipeline: Pipeline,
}

impl ToolServer {
    /// Serve tools over `pipeline`.
    pub fn new(pipeline: Pipeline) -> Self {
        ToolServer { pipeline }
    }

    /// The pipeline the tools run on.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run one tool and return its result object.
    pub fn call(&self, tool: &str, arguments: &Value) -> Result<Value> {
        let p = &self.pipeline;
        match tool {
            "get_all_datasets_and_metadata" => Ok(json!({ "datasets": p.list_datasets() })),
            "get_dataset_image_and_metadata" => {
                let args: DatasetArgs = parse_args(arguments)?;
                let dataset = p.get_dataset_image(&args.dataset)?;
                Ok(json!({ "image_json": dataset.image, "metadata": dataset.metadata }))
            }
            "mask_image" => {
                let args: MaskArgs = parse_args(arguments)?;
                let image = handle("image", &args.image_json)?;
                let geometry = handle("geometry", &args.geometry_json)?;
                Ok(json!({ "image_json": p.mask_image(&image, &geometry)? }))
            }
            "mask_image_with_image" => {
                let args: MaskWithImageArgs = parse_args(arguments)?;
                let image = handle("image", &args.image_json)?;
                let mask = handle("mask_image", &args.mask_image_json)?;
                Ok(json!({ "image_json": p.mask_image_with_image(&image, &mask)? }))
            }
            "filter_image_by_threshold" => {
                let args: ThresholdArgs = parse_args(arguments)?;
                let comparison = args
                    .comparison
                    .as_deref()
                    .map(|c| literal::<Comparison>("comparison", c))
                    .transpose()?;
                let image = handle("image", &args.image_json)?;
                let binary = p.filter_image_by_threshold(&image, args.threshold, comparison)?;
                Ok(json!({ "image_json": binary }))
            }
            "union_binary_images" => {
                let args: ImagesArgs = parse_args(arguments)?;
                let images = handles("images", &args.images_json)?;
                Ok(json!({ "image_json": p.union_all(&images)? }))
            }
            "intersect_binary_images" => {
                let args: ImagesArgs = parse_args(arguments)?;
                let images = handles("images", &args.images_json)?;
                Ok(json!({ "image_json": p.intersect_all(&images)? }))
            }
            "intersect_feature_collections" => {
                let args: CollectionPairArgs = parse_args(arguments)?;
                let a = handle("collection1", &args.collection1_json)?;
                let b = handle("collection2", &args.collection2_json)?;
                Ok(json!({ "feature_collection_json": p.intersect_feature_collections(&a, &b)? }))
            }
            "merge_feature_collections" => {
                let args: CollectionsArgs = parse_args(arguments)?;
                let collections = handles("collections", &args.collections_json)?;
                Ok(json!({ "feature_collection_json": p.merge_all(&collections)? }))
            }
            "reduce_image" => {
                let args: ReduceArgs = parse_args(arguments)?;
                let reducer = literal::<Reducer>("reducer", &args.reducer)?;
                let image = handle("image", &args.image_json)?;
                let geometry = handle("geometry", &args.geometry_json)?;
                let result = p.reduce_image(&image, &geometry, reducer, args.scale)?;
                Ok(json!({
                    "reducer": result.reducer,
                    "scale": result.scale,
                    "values": result.values,
                    "value": result.scalar(),
                }))
            }
            "get_zone_of_area" => {
                let args: ZoneArgs = parse_args(arguments)?;
                let geometry = handle("geometry", &args.geometry_json)?;
                Ok(json!({ "geometry_json": p.get_zone_of_area(&geometry, args.buffer_distance)? }))
            }
            "get_admin_boundary" => {
                let args: BoundaryArgs = parse_args(arguments)?;
                let area_type = literal::<AreaType>("area_type", &args.area_type)?;
                let boundary = p.get_admin_boundary(&args.code, area_type)?;
                Ok(json!({ "feature_collection_json": boundary }))
            }
            "collection_geometry" => {
                let args: CollectionArgs = parse_args(arguments)?;
                let collection = handle("collection", &args.collection_json)?;
                Ok(json!({ "geometry_json": p.collection_geometry(&collection)? }))
            }
            "verify_handle" => {
                let args: VerifyArgs = parse_args(arguments)?;
                let verified = p.verify_handle(&handle("handle", &args.handle_json)?)?;
                Ok(json!({ "kind": verified.kind, "assets": verified.assets }))
            }
            "build_map" => self.build_map(parse_args(arguments)?),
            other => Err(OpsError::validation(
                "tool",
                format!("unknown tool '{}' (available: {})", other, TOOLS.join(", ")),
            )),
        }
    }

    fn build_map(&self, args: MapArgs) -> Result<Value> {
        let image = map_input("image", &args.image_json)?;
        let mut builder = MapBuilder::new(&self.pipeline).overlay(image, args.vis_params);
        if let Some(geometry) = &args.geometry_json {
            builder = builder.outline(map_input("geometry", geometry)?);
        }
        if let Some(title) = args.title {
            builder = builder.title(title);
        }
        let map = builder.build()?;
        Ok(json!({ "html": map.html, "view": map.view, "layers": map.layers }))
    }

    /// Run a request object and wrap the outcome in a response envelope.
    pub fn handle_request(&self, request: &Value) -> Value {
        let tool = request.get("tool").and_then(Value::as_str);
        let arguments = request.get("arguments").cloned().unwrap_or(Value::Null);

        let Some(tool) = tool else {
            let err = OpsError::validation("tool", "request has no 'tool' name");
            return failure(&err, &arguments);
        };

        let span = info_span!("tool", name = tool);
        let _enter = span.enter();
        let started = Instant::now();
        let outcome = self.call(tool, &arguments);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                info!(elapsed_ms, "ok");
                json!({ "ok": true, "result": result, "input_arguments": arguments })
            }
            Err(err) => {
                warn!(elapsed_ms, kind = err.kind(), "{}", err);
                failure(&err, &arguments)
            }
        }
    }

    /// Handle one line of the wire protocol and return the response line.
    pub fn handle_line(&self, line: &str) -> String {
        let response = match serde_json::from_str::<Value>(line) {
            Ok(request @ Value::Object(_)) => self.handle_request(&request),
            Ok(_) => failure(
                &OpsError::validation("request", "expected a JSON object"),
                &Value::Null,
            ),
            Err(e) => {
                debug!("unparseable request: {}", e);
                failure(
                    &OpsError::validation("request", format!("not valid JSON: {}", e)),
                    &Value::Null,
                )
            }
        };
        response.to_string()
    }
}

fn failure(err: &OpsError, arguments: &Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "category": err.category(),
            "kind": err.kind(),
            "message": err.to_string(),
        },
        "input_arguments": arguments,
    })
}
