//! Bridge between [`Value`] and `serde_json`.

use crate::collections::{Array, Map};
use crate::error::{Error, Result};
use crate::value::Value;

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s.into()),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect::<Array>())
            }
            serde_json::Value::Object(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect::<Map>(),
            ),
        }
    }
}

impl Value {
    /// Converts a JSON-safe value into `serde_json`.
    ///
    /// # Errors
    ///
    /// Returns an error for instances, functions, undefined and non-finite
    /// floats, which plain JSON cannot carry. The serializer handles those.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .ok_or_else(|| Error::serialization(format!("non-finite number {n}")))?,
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Array(items) => serde_json::Value::Array(
                items.iter().map(Self::to_json).collect::<Result<Vec<_>>>()?,
            ),
            Self::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map.iter() {
                    out.insert(k.to_string(), v.to_json()?);
                }
                serde_json::Value::Object(out)
            }
            Self::Undefined | Self::Instance(_) | Self::Function(_) => {
                return Err(Error::serialization(format!(
                    "{} is not plain JSON",
                    self.describe()
                )));
            }
        })
    }

    /// Parses JSON text into a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON.
    pub fn parse_json(text: &str) -> Result<Self> {
        serde_json::from_str::<serde_json::Value>(text)
            .map(Self::from)
            .map_err(|e| Error::serialization(e.to_string()))
    }
}
