use anyhow::Result;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::EngineError;

/// One cell of a raw row or of a dataset matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    #[serde(skip_deserializing)]
    Date(DateTime<Utc>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The number held by this cell, if it is a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        self.as_number().is_some()
    }

    /// Numeric reading of a cell the way a loosely typed consumer would see
    /// it: numeric text is parsed, null/blank read as zero. `None` when the
    /// cell cannot be read as a number at all.
    pub fn numeric_reading(&self) -> Option<f64> {
        let n = match self {
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().ok()?
                }
            }
            Value::Date(d) => d.timestamp_millis() as f64,
        };
        n.is_finite().then_some(n)
    }

    /// [`Value::numeric_reading`] with unreadable cells counted as zero.
    pub fn coerce_number(&self) -> f64 {
        self.numeric_reading().unwrap_or(0.0)
    }

    /// Text form used when a cell becomes part of a key chain.
    pub fn to_label(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.to_rfc3339(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            JsonValue::String(s) => Value::Text(s),
            // Nested structures are flattened to their JSON text
            other => Value::Text(other.to_string()),
        }
    }
}

/// A raw query-result row: column name -> cell, in column order.
pub type Row = IndexMap<String, Value>;

/// The rows handed to the engine. Shape is not validated; a column missing
/// from a row reads as null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Create a RowSet from a JSON Array of Objects
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| EngineError::Data("input must be a JSON array of objects".into()))?;

        let mut rows = Vec::with_capacity(array.len());
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| EngineError::Data(format!("row {} is not an object", rows.len())))?;

            let row: Row = obj
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect();
            rows.push(row);
        }

        Ok(Self { rows })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(text)?;
        Self::from_json(&value)
    }
}

/// Read a cell, treating an absent column as null.
pub fn cell<'a>(row: &'a Row, field: &str) -> &'a Value {
    static NULL: Value = Value::Null;
    row.get(field).unwrap_or(&NULL)
}
