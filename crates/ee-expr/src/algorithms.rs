//! Enumerated algorithm parameters.

use crate::ParseLiteralError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! literal_serde {
    ($name:ident) => {
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ============================================================================
// Comparison
// ============================================================================

/// Pixelwise comparison used when thresholding an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Equal.
    Eq,
}

impl Comparison {
    /// Accepted literals.
    pub const LITERALS: &'static [&'static str] = &["gt", "gte", "lt", "lte", "eq"];

    /// The literal form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Gt => "gt",
            Comparison::Gte => "gte",
            Comparison::Lt => "lt",
            Comparison::Lte => "lte",
            Comparison::Eq => "eq",
        }
    }

    /// The remote algorithm implementing this comparison.
    pub fn function_name(&self) -> &'static str {
        match self {
            Comparison::Gt => "Image.gt",
            Comparison::Gte => "Image.gte",
            Comparison::Lt => "Image.lt",
            Comparison::Lte => "Image.lte",
            Comparison::Eq => "Image.eq",
        }
    }

    /// Default comparison for a threshold: `lt` below zero, `gt` otherwise.
    pub fn default_for(threshold: f64) -> Self {
        if threshold < 0.0 {
            Comparison::Lt
        } else {
            Comparison::Gt
        }
    }

    /// Evaluate the comparison locally.
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Gt => value > threshold,
            Comparison::Gte => value >= threshold,
            Comparison::Lt => value < threshold,
            Comparison::Lte => value <= threshold,
            Comparison::Eq => value == threshold,
        }
    }
}

impl FromStr for Comparison {
    type Err = ParseLiteralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gt" => Ok(Comparison::Gt),
            "gte" => Ok(Comparison::Gte),
            "lt" => Ok(Comparison::Lt),
            "lte" => Ok(Comparison::Lte),
            "eq" => Ok(Comparison::Eq),
            _ => Err(ParseLiteralError {
                what: "comparison",
                literal: s.to_string(),
                expected: Self::LITERALS,
            }),
        }
    }
}

literal_serde!(Comparison);

// ============================================================================
// Reducer
// ============================================================================

/// Statistical aggregation applied during a spatial reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reducer {
    /// Sum of pixel values.
    Sum,
    /// Mean pixel value.
    Mean,
    /// Number of contributing pixels, regardless of value.
    Count,
    /// Maximum pixel value.
    Max,
    /// Minimum pixel value.
    Min,
    /// Median pixel value.
    Median,
    /// Standard deviation of pixel values.
    StdDev,
}

impl Reducer {
    /// Accepted literals.
    pub const LITERALS: &'static [&'static str] =
        &["sum", "mean", "count", "max", "min", "median", "std_dev"];

    /// The literal form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Sum => "sum",
            Reducer::Mean => "mean",
            Reducer::Count => "count",
            Reducer::Max => "max",
            Reducer::Min => "min",
            Reducer::Median => "median",
            Reducer::StdDev => "std_dev",
        }
    }

    /// The remote constructor for this reducer.
    pub fn function_name(&self) -> &'static str {
        match self {
            Reducer::Sum => "Reducer.sum",
            Reducer::Mean => "Reducer.mean",
            Reducer::Count => "Reducer.count",
            Reducer::Max => "Reducer.max",
            Reducer::Min => "Reducer.min",
            Reducer::Median => "Reducer.median",
            Reducer::StdDev => "Reducer.stdDev",
        }
    }

    /// Suffix the remote service appends to band names in reduction output.
    pub fn output_suffix(&self) -> &'static str {
        match self {
            Reducer::StdDev => "stdDev",
            other => other.as_str(),
        }
    }
}

impl FromStr for Reducer {
    type Err = ParseLiteralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Reducer::Sum),
            "mean" => Ok(Reducer::Mean),
            "count" => Ok(Reducer::Count),
            "max" => Ok(Reducer::Max),
            "min" => Ok(Reducer::Min),
            "median" => Ok(Reducer::Median),
            "std_dev" | "stddev" | "std" => Ok(Reducer::StdDev),
            _ => Err(ParseLiteralError {
                what: "reducer",
                literal: s.to_string(),
                expected: Self::LITERALS,
            }),
        }
    }
}

literal_serde!(Reducer);
