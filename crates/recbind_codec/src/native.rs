//! In-memory attribute values and declared attribute types.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// The declared type of a mapped attribute.
///
/// The codec registry selects a codec by inspecting this descriptor,
/// so it plays the role a field's static type plays in a reflective
/// mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// `bool`.
    Bool,
    /// `i8`.
    I8,
    /// `i16`.
    I16,
    /// `i32`.
    I32,
    /// `i64`.
    I64,
    /// `f32`.
    F32,
    /// `f64`.
    F64,
    /// `String`.
    Text,
    /// `Vec<u8>`.
    Bytes,
    /// A point in time with millisecond precision.
    Timestamp,
    /// A fixed-point decimal held as integer units at `scale` digits.
    Fixed {
        /// Number of decimal digits after the point.
        scale: u32,
    },
    /// A unit-only enumeration stored by variant name.
    Enum {
        /// Enumeration type name.
        name: &'static str,
        /// Every accepted variant name.
        variants: &'static [&'static str],
    },
    /// A structured type serialized as a JSON document.
    Json {
        /// The structured type's name.
        type_name: &'static str,
    },
    /// Ordered list of elements.
    List(Box<TypeDescriptor>),
    /// String-keyed map of elements.
    Map(Box<TypeDescriptor>),
    /// Unordered set of elements.
    Set(Box<TypeDescriptor>),
    /// A storage value handled without conversion.
    Raw,
    /// A user type that needs a registered codec.
    Custom(&'static str),
}

impl TypeDescriptor {
    /// List of `element`.
    pub fn list(element: TypeDescriptor) -> Self {
        Self::List(Box::new(element))
    }

    /// Map of string to `element`.
    pub fn map(element: TypeDescriptor) -> Self {
        Self::Map(Box::new(element))
    }

    /// Set of `element`.
    pub fn set(element: TypeDescriptor) -> Self {
        Self::Set(Box::new(element))
    }

    /// Returns true for list, map and set descriptors.
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_) | Self::Set(_))
    }

    /// Returns the element type of a collection descriptor.
    pub fn element(&self) -> Option<&TypeDescriptor> {
        match self {
            Self::List(e) | Self::Map(e) | Self::Set(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::I8 => f.write_str("i8"),
            Self::I16 => f.write_str("i16"),
            Self::I32 => f.write_str("i32"),
            Self::I64 => f.write_str("i64"),
            Self::F32 => f.write_str("f32"),
            Self::F64 => f.write_str("f64"),
            Self::Text => f.write_str("String"),
            Self::Bytes => f.write_str("Vec<u8>"),
            Self::Timestamp => f.write_str("SystemTime"),
            Self::Fixed { scale } => write!(f, "Fixed<{scale}>"),
            Self::Enum { name, .. } => f.write_str(name),
            Self::Json { type_name } => write!(f, "Json<{type_name}>"),
            Self::List(e) => write!(f, "Vec<{e}>"),
            Self::Map(e) => write!(f, "Map<String, {e}>"),
            Self::Set(e) => write!(f, "Set<{e}>"),
            Self::Raw => f.write_str("Value"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// An attribute value as held by an application object.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// No value. Null attributes are left out of the stored record.
    Null,
    /// Boolean.
    Bool(bool),
    /// 8-bit integer.
    I8(i8),
    /// 16-bit integer.
    I16(i16),
    /// 32-bit integer.
    I32(i32),
    /// 64-bit integer.
    I64(i64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// Text.
    Text(String),
    /// Bytes.
    Bytes(Vec<u8>),
    /// Point in time.
    Timestamp(SystemTime),
    /// Fixed-point units; the scale comes from the declared type.
    Fixed(i64),
    /// Enumeration variant name.
    Enum(String),
    /// A JSON document.
    Json(serde_json::Value),
    /// Ordered list.
    List(Vec<FieldValue>),
    /// String-keyed map.
    Map(BTreeMap<String, FieldValue>),
    /// Set elements; order carries no meaning.
    Set(Vec<FieldValue>),
    /// An unconverted storage value.
    Raw(Value),
}

impl FieldValue {
    /// Short label of this value's variant, used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::Fixed(_) => "fixed",
            Self::Enum(_) => "enum",
            Self::Json(_) => "json",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Set(_) => "set",
            Self::Raw(_) => "raw",
        }
    }

    /// Returns true for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Serializes `value` into a JSON field value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> CodecResult<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Deserializes a JSON field value into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a JSON value or it does not
    /// match `T`.
    pub fn from_json<T: DeserializeOwned>(self) -> CodecResult<T> {
        match self {
            Self::Json(v) => Ok(serde_json::from_value(v)?),
            other => Err(mismatch("json", &other)),
        }
    }

    /// Builds a list from anything convertible to field values.
    pub fn list<T: Into<FieldValue>>(items: impl IntoIterator<Item = T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Converts a nullable field value, mapping `Null` to `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is present but not a `T`.
    pub fn into_option<T>(self) -> CodecResult<Option<T>>
    where
        T: TryFrom<FieldValue, Error = CodecError>,
    {
        match self {
            Self::Null => Ok(None),
            other => T::try_from(other).map(Some),
        }
    }

    /// Converts a list or set field value element-wise.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a list or set, or an element is
    /// not a `T`.
    pub fn into_vec<T>(self) -> CodecResult<Vec<T>>
    where
        T: TryFrom<FieldValue, Error = CodecError>,
    {
        match self {
            Self::List(items) | Self::Set(items) => items.into_iter().map(T::try_from).collect(),
            Self::Null => Ok(Vec::new()),
            other => Err(mismatch("list", &other)),
        }
    }

    /// Converts a map field value value-wise.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a map, or a value is not a `T`.
    pub fn into_map<T>(self) -> CodecResult<BTreeMap<String, T>>
    where
        T: TryFrom<FieldValue, Error = CodecError>,
    {
        match self {
            Self::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::try_from(v).map(|v| (k, v)))
                .collect(),
            Self::Null => Ok(BTreeMap::new()),
            other => Err(mismatch("map", &other)),
        }
    }
}

fn mismatch(expected: &str, found: &FieldValue) -> CodecError {
    CodecError::unexpected_value("conversion", format!("{} where {expected} was expected", found.label()))
}

macro_rules! field_value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    FieldValue::$variant(v)
                }
            }

            impl TryFrom<FieldValue> for $ty {
                type Error = CodecError;

                fn try_from(v: FieldValue) -> CodecResult<Self> {
                    match v {
                        FieldValue::$variant(inner) => Ok(inner),
                        other => Err(mismatch(stringify!($ty), &other)),
                    }
                }
            }
        )*
    };
}

field_value_conversions! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    String => Text,
    Vec<u8> => Bytes,
    SystemTime => Timestamp,
    serde_json::Value => Json,
    Value => Raw,
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}
