//! Composite codec for list, map and set attributes.

use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::native::{FieldValue, TypeDescriptor};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Converts collections element by element using the element type's
/// codec.
///
/// Lists and maps keep their native shape. Sets have no native storage
/// kind and are written as lists; duplicates are dropped on decode,
/// keeping the first occurrence.
///
/// When the element type is JSON, the element codec writes each element
/// as a JSON string, and on read accepts either a string or an already
/// native composite per element.
pub struct CollectionCodec {
    element: Arc<dyn Codec>,
}

impl CollectionCodec {
    /// Creates a collection codec around the element codec.
    pub fn new(element: Arc<dyn Codec>) -> Self {
        Self { element }
    }

    /// Name of the wrapped element codec.
    pub fn element_codec(&self) -> &'static str {
        self.element.name()
    }

    fn element_type(ty: &TypeDescriptor) -> CodecResult<&TypeDescriptor> {
        ty.element()
            .ok_or_else(|| CodecError::unsupported_type(ty.to_string()))
    }

    fn encode_items(&self, ty: &TypeDescriptor, items: &[FieldValue]) -> CodecResult<Value> {
        let element_ty = Self::element_type(ty)?;
        items
            .iter()
            .map(|item| self.element.to_storage(element_ty, item))
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::List)
    }

    fn decode_items(&self, ty: &TypeDescriptor, items: &[Value]) -> CodecResult<Vec<FieldValue>> {
        let element_ty = Self::element_type(ty)?;
        items
            .iter()
            .map(|item| self.element.from_storage(element_ty, item))
            .collect()
    }
}

impl std::fmt::Debug for CollectionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionCodec")
            .field("element", &self.element.name())
            .finish()
    }
}

impl Codec for CollectionCodec {
    fn name(&self) -> &'static str {
        "collection"
    }

    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        ty.is_collection()
    }

    fn to_storage(&self, ty: &TypeDescriptor, value: &FieldValue) -> CodecResult<Value> {
        match (ty, value) {
            (TypeDescriptor::List(_) | TypeDescriptor::Set(_), FieldValue::List(items) | FieldValue::Set(items)) => {
                self.encode_items(ty, items)
            }
            (TypeDescriptor::Map(element_ty), FieldValue::Map(entries)) => entries
                .iter()
                .map(|(k, v)| self.element.to_storage(element_ty, v).map(|v| (k.clone(), v)))
                .collect::<CodecResult<BTreeMap<_, _>>>()
                .map(Value::Map),
            (_, other) => Err(CodecError::unexpected_value(self.name(), other.label())),
        }
    }

    fn from_storage(&self, ty: &TypeDescriptor, value: &Value) -> CodecResult<FieldValue> {
        match (ty, value) {
            (TypeDescriptor::List(_), Value::List(items)) => {
                self.decode_items(ty, items).map(FieldValue::List)
            }
            (TypeDescriptor::Set(_), Value::List(items)) => {
                // Duplicates are judged on the stored form, where float
                // equality is bitwise.
                let mut seen: Vec<&Value> = Vec::with_capacity(items.len());
                for item in items {
                    if !seen.contains(&item) {
                        seen.push(item);
                    }
                }
                let unique: Vec<Value> = seen.into_iter().cloned().collect();
                self.decode_items(ty, &unique).map(FieldValue::Set)
            }
            (TypeDescriptor::Map(element_ty), Value::Map(entries)) => entries
                .iter()
                .map(|(k, v)| self.element.from_storage(element_ty, v).map(|v| (k.clone(), v)))
                .collect::<CodecResult<BTreeMap<_, _>>>()
                .map(FieldValue::Map),
            (TypeDescriptor::Map(_), v) => Err(CodecError::unexpected_kind(self.name(), "map", v.kind())),
            (_, v) => Err(CodecError::unexpected_kind(self.name(), "list", v.kind())),
        }
    }
}
