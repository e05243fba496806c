//! JSON document codec.

use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::native::{FieldValue, TypeDescriptor};
use crate::value::Value;
use serde_json::{Map, Number};

/// Stores a structured value as a JSON text document.
///
/// On read, text is parsed as JSON. A native list or map is accepted as
/// well and converted directly; records written before an attribute was
/// switched to JSON stay readable that way.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        matches!(ty, TypeDescriptor::Json { .. })
    }

    fn to_storage(&self, _ty: &TypeDescriptor, value: &FieldValue) -> CodecResult<Value> {
        match value {
            FieldValue::Json(doc) => Ok(Value::Text(serde_json::to_string(doc)?)),
            other => Err(CodecError::unexpected_value(self.name(), other.label())),
        }
    }

    fn from_storage(&self, _ty: &TypeDescriptor, value: &Value) -> CodecResult<FieldValue> {
        match value {
            Value::Text(text) => Ok(FieldValue::Json(serde_json::from_str(text)?)),
            other => Ok(FieldValue::Json(to_json(other))),
        }
    }
}

/// Converts a storage value into the equivalent JSON document.
///
/// Non-finite floats become `null`; bytes become an array of numbers.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Integer(n) => serde_json::Value::Number(Number::from(*n)),
        Value::Float(f) => Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::Array(
            b.iter().map(|byte| serde_json::Value::Number(Number::from(*byte))).collect(),
        ),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect::<Map<String, serde_json::Value>>(),
        ),
    }
}
