//! Canonical feature ordering and numeric matrix assembly.

use log::debug;
use serde_json::{Map, Value};

use crate::error::{PredictError, Result};
use crate::normalize::{RawBatch, RawRow};

/// Feature order the artifact was trained with. Do not reorder.
pub const FEATURE_NAMES: [&str; 13] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Value used for a feature name missing from a named row.
pub const MISSING_FEATURE_DEFAULT: f32 = 0.0;

/// One sample in canonical feature order.
pub type Row = [f32; FEATURE_COUNT];

/// Non-empty, row-major batch of feature vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<Row>,
}

impl FeatureMatrix {
    /// Returns `None` for an empty row list.
    pub fn new(rows: Vec<Row>) -> Option<Self> {
        if rows.is_empty() {
            None
        } else {
            Some(Self { rows })
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Orders a named row, filling absent features with [`MISSING_FEATURE_DEFAULT`].
pub fn named_row(features: &Map<String, Value>) -> Result<Row> {
    let mut row = [MISSING_FEATURE_DEFAULT; FEATURE_COUNT];
    for (slot, name) in row.iter_mut().zip(FEATURE_NAMES) {
        if let Some(value) = features.get(name) {
            let number = coerce(value).ok_or_else(|| {
                PredictError::shape(format!(
                    "Feature '{}' must be numeric, got {}",
                    name, value
                ))
            })?;
            *slot = narrow(number).ok_or_else(|| {
                PredictError::shape(format!(
                    "Feature '{}' value {} is out of range",
                    name, value
                ))
            })?;
        }
    }

    let unknown: Vec<&str> = features
        .keys()
        .map(String::as_str)
        .filter(|key| !FEATURE_NAMES.contains(key))
        .collect();
    if !unknown.is_empty() {
        debug!("Ignoring unknown feature names: {:?}", unknown);
    }

    Ok(row)
}

/// Validates a positional row: exactly [`FEATURE_COUNT`] JSON numbers.
pub fn numeric_row(index: usize, values: &[Value]) -> Result<Row> {
    if values.len() != FEATURE_COUNT {
        return Err(PredictError::shape(format!(
            "Invalid feature vector shape: row {} has {} values, expected {}",
            index,
            values.len(),
            FEATURE_COUNT
        )));
    }

    let mut row = [MISSING_FEATURE_DEFAULT; FEATURE_COUNT];
    for (position, (slot, value)) in row.iter_mut().zip(values).enumerate() {
        let number = value.as_f64().ok_or_else(|| {
            PredictError::shape(format!(
                "Non-numeric value at row {}, position {}: {}",
                index, position, value
            ))
        })?;
        *slot = narrow(number).ok_or_else(|| {
            PredictError::shape(format!(
                "Value {} at row {}, position {} is out of range",
                value, index, position
            ))
        })?;
    }
    Ok(row)
}

/// Builds the numeric matrix for a normalized batch.
pub fn build_matrix(batch: &RawBatch) -> Result<FeatureMatrix> {
    let rows = batch
        .rows()
        .iter()
        .enumerate()
        .map(|(index, raw)| match raw {
            RawRow::Named(features) => named_row(features),
            RawRow::Numeric(values) => numeric_row(index, values),
        })
        .collect::<Result<Vec<_>>>()?;

    FeatureMatrix::new(rows).ok_or_else(|| PredictError::shape("No rows to predict"))
}

// Mirrors float() coercion: numbers, booleans and numeric strings.
fn coerce(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(number).filter(|v| v.is_finite())
}

/// `None` when the value does not fit in an `f32`.
fn narrow(number: f64) -> Option<f32> {
    Some(number as f32).filter(|v| v.is_finite())
}
