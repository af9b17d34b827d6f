//! Serialization layer. The document is JSON via serde_json.
//!
//! Implement [`Serializer`] if the tree should be stored in a different
//! format; the document shape (objects for nodes, strings and string arrays
//! for keys) stays the same.

use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// Converts a whole document to/from bytes for persistence.
pub trait Serializer: Send + Sync {
    /// Encode the document to bytes.
    fn serialize(&self, doc: &Value) -> Result<Vec<u8>>;

    /// Decode bytes into the top-level object of the document.
    fn deserialize(&self, bytes: &[u8]) -> Result<Map<String, Value>>;
}

/// JSON serializer with optional pretty-printing.
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact JSON (single line, no extra whitespace).
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-printed JSON with indentation, easier to edit by hand.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Serializer for JsonSerializer {
    fn serialize(&self, doc: &Value) -> Result<Vec<u8>> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(doc)
        } else {
            serde_json::to_vec(doc)
        };
        bytes.map_err(Error::from)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Map<String, Value>> {
        match serde_json::from_slice(bytes)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Deserialize(format!(
                "document root must be an object, found {}",
                kind(&other)
            ))),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
