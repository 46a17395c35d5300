// src/recommender/materialize.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::ItemId;

/// A scored item as handed to the rest of the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub score: f64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("expected a list of rows, got {0}")]
    NotAList(String),

    #[error("row {index}: missing field {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("row {index}: field {field} is not numeric: {value}")]
    NotNumeric { index: usize, field: &'static str, value: String },
}

/// Converts untyped rows from the oracle into fixed records.
///
/// `null`, an empty list and an empty object all mean "no recommendations".
pub fn materialize(value: &Value) -> Result<Vec<Recommendation>, MaterializeError> {
    let rows = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) if map.is_empty() => return Ok(Vec::new()),
        Value::Array(rows) => rows,
        other => return Err(MaterializeError::NotAList(kind_of(other).to_string())),
    };

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let item_id = field(row, index, "item_id")?;
            let score = field(row, index, "score")?;
            Ok(Recommendation {
                item_id: as_item_id(item_id).ok_or_else(|| not_numeric(index, "item_id", item_id))?,
                score: as_score(score).ok_or_else(|| not_numeric(index, "score", score))?,
            })
        })
        .collect()
}

fn field<'a>(row: &'a Value, index: usize, name: &'static str) -> Result<&'a Value, MaterializeError> {
    match row.get(name) {
        Some(Value::Null) | None => Err(MaterializeError::MissingField { index, field: name }),
        Some(value) => Ok(value),
    }
}

fn as_item_id(value: &Value) -> Option<ItemId> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
fn integral(f: f64) -> Option<ItemId> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then(|| f as i64)
}

fn as_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn not_numeric(index: usize, field: &'static str, value: &Value) -> MaterializeError {
    MaterializeError::NotNumeric { index, field, value: value.to_string() }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

