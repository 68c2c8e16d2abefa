//! Reduction results.

use ee_expr::Reducer;
use geohaz_gateway::GatewayError;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-band aggregates returned by `reduce_image`.
///
/// A band with no unmasked pixels inside the region reduces to `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReductionResult {
    /// Reducer applied.
    pub reducer: Reducer,
    /// Pixel size used, in meters.
    pub scale: f64,
    /// Aggregate per band name.
    pub values: BTreeMap<String, Option<f64>>,
}

impl ReductionResult {
    /// Interpret a reduction dictionary returned by the service.
    pub(crate) fn from_value(
        reducer: Reducer,
        scale: f64,
        value: Value,
    ) -> Result<Self, GatewayError> {
        let Value::Object(dictionary) = value else {
            return Err(GatewayError::Decode(format!(
                "reduction returned {} instead of a dictionary",
                type_name(&value)
            )));
        };

        let suffix = format!("_{}", reducer.output_suffix());
        let mut values = BTreeMap::new();
        for (key, v) in dictionary {
            let band = key.strip_suffix(&suffix).unwrap_or(&key).to_string();
            let number = match v {
                Value::Null => None,
                Value::Number(n) => n.as_f64(),
                other => {
                    return Err(GatewayError::Decode(format!(
                        "band '{}' reduced to {}",
                        key,
                        type_name(&other)
                    )))
                }
            };
            values.insert(band, number);
        }
        Ok(ReductionResult {
            reducer,
            scale,
            values,
        })
    }

    /// The aggregate of a single-band image.
    ///
    /// `None` when the image has several bands or the region held no data.
    pub fn scalar(&self) -> Option<f64> {
        match self.values.len() {
            1 => self.values.values().next().copied().flatten(),
            _ => None,
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a dictionary",
    }
}
