//! Payload parsing: turns the loosely-typed request body into a canonical,
//! non-empty batch of raw rows.
//!
//! Two request shapes are accepted:
//!
//! * `{"values": [..13 numbers..]}` or `{"values": [[..], [..]]}`
//! * `{"input": {"age": 63, ...}}` or `{"input": [{...}, {...}]}`
//!
//! `values` takes precedence when both fields are present. Rows produced from
//! `input` are still keyed by feature name; ordering happens in
//! [`crate::features`].

use serde_json::{Map, Value};

use crate::error::{PredictError, Result};

const VALUES_SHAPE: &str =
    "'values' must be a list of numbers (single row) or list-of-lists (batch)";
const INPUT_ITEM_SHAPE: &str = "When 'input' is a list, each item must be an object/map";

/// A request body after the `values`/`input` decision has been made.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Values(Value),
    Input(Value),
}

impl Payload {
    /// Picks the payload interpretation from a request body.
    ///
    /// A `null` field counts as absent.
    pub fn from_json(body: Value) -> Result<Self> {
        let mut fields = match body {
            Value::Object(fields) => fields,
            other => {
                return Err(PredictError::structure(format!(
                    "Request body must be a JSON object, got {}",
                    json_type(&other)
                )))
            }
        };

        if let Some(values) = fields.remove("values").filter(|v| !v.is_null()) {
            return Ok(Payload::Values(values));
        }
        match fields.remove("input").filter(|v| !v.is_null()) {
            Some(input) => Ok(Payload::Input(input)),
            None => Err(PredictError::MissingPayload),
        }
    }
}

impl TryFrom<Value> for Payload {
    type Error = PredictError;

    fn try_from(body: Value) -> Result<Self> {
        Payload::from_json(body)
    }
}

/// One sample before feature ordering.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    /// Feature name to value, from `input`.
    Named(Map<String, Value>),
    /// Positional values, from `values`. Not yet checked for length or type.
    Numeric(Vec<Value>),
}

/// Non-empty ordered list of raw rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    rows: Vec<RawRow>,
}

impl RawBatch {
    fn single(row: RawRow) -> Self {
        Self { rows: vec![row] }
    }

    fn from_rows(rows: Vec<RawRow>) -> Option<Self> {
        if rows.is_empty() {
            None
        } else {
            Some(Self { rows })
        }
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Converts a payload into a batch of raw rows.
pub fn normalize(payload: Payload) -> Result<RawBatch> {
    match payload {
        Payload::Values(values) => normalize_values(values),
        Payload::Input(input) => normalize_input(input),
    }
}

fn normalize_values(values: Value) -> Result<RawBatch> {
    let items = match values {
        Value::Array(items) => items,
        _ => return Err(PredictError::shape(VALUES_SHAPE)),
    };
    if items.is_empty() {
        return Err(PredictError::shape("Empty 'values' provided"));
    }

    if items.iter().all(Value::is_number) {
        return Ok(RawBatch::single(RawRow::Numeric(items)));
    }

    let rows = items
        .into_iter()
        .map(|item| match item {
            Value::Array(row) => Ok(RawRow::Numeric(row)),
            _ => Err(PredictError::shape(VALUES_SHAPE)),
        })
        .collect::<Result<Vec<_>>>()?;

    RawBatch::from_rows(rows).ok_or_else(|| PredictError::shape(VALUES_SHAPE))
}

fn normalize_input(input: Value) -> Result<RawBatch> {
    match input {
        Value::Object(features) => Ok(RawBatch::single(RawRow::Named(features))),
        Value::Array(items) => {
            let rows = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(features) => Ok(RawRow::Named(features)),
                    _ => Err(PredictError::structure(INPUT_ITEM_SHAPE)),
                })
                .collect::<Result<Vec<_>>>()?;
            RawBatch::from_rows(rows).ok_or_else(|| {
                PredictError::structure("'input' list must contain at least one object")
            })
        }
        other => Err(PredictError::structure(format!(
            "'input' must be an object/map or a list of objects, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
