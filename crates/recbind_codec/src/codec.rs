//! The codec trait and the built-in scalar codecs.

use crate::error::{CodecError, CodecResult};
use crate::native::{FieldValue, TypeDescriptor};
use crate::value::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A bidirectional converter between an in-memory attribute value and a
/// storage value.
///
/// Implementations must satisfy the round-trip law:
/// `from_storage(ty, to_storage(ty, v)) == v` for every `v` in the
/// accepted domain, unless the codec documents itself as lossy.
pub trait Codec: Send + Sync {
    /// Stable name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Returns true if this codec can convert values of `ty`.
    fn accepts(&self, ty: &TypeDescriptor) -> bool;

    /// Converts an in-memory value to its storage form.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is outside the codec's domain.
    fn to_storage(&self, ty: &TypeDescriptor, value: &FieldValue) -> CodecResult<Value>;

    /// Converts a storage value back into its in-memory form.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` has a kind the codec cannot decode.
    fn from_storage(&self, ty: &TypeDescriptor, value: &Value) -> CodecResult<FieldValue>;
}

fn unexpected(codec: &'static str, value: &FieldValue) -> CodecError {
    CodecError::unexpected_value(codec, value.label())
}

/// Passes 64-bit integers, 64-bit floats, text, bytes and raw storage
/// values through without conversion.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn name(&self) -> &'static str {
        "pass-through"
    }

    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        matches!(
            ty,
            TypeDescriptor::I64
                | TypeDescriptor::F64
                | TypeDescriptor::Text
                | TypeDescriptor::Bytes
                | TypeDescriptor::Raw
        )
    }

    fn to_storage(&self, _ty: &TypeDescriptor, value: &FieldValue) -> CodecResult<Value> {
        match value {
            FieldValue::I64(n) => Ok(Value::Integer(*n)),
            FieldValue::F64(f) => Ok(Value::Float(*f)),
            FieldValue::Text(s) => Ok(Value::Text(s.clone())),
            FieldValue::Bytes(b) => Ok(Value::Bytes(b.clone())),
            FieldValue::Raw(v) => Ok(v.clone()),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn from_storage(&self, ty: &TypeDescriptor, value: &Value) -> CodecResult<FieldValue> {
        match (ty, value) {
            (TypeDescriptor::Raw, v) => Ok(FieldValue::Raw(v.clone())),
            (TypeDescriptor::I64, Value::Integer(n)) => Ok(FieldValue::I64(*n)),
            (TypeDescriptor::F64, Value::Float(f)) => Ok(FieldValue::F64(*f)),
            // Engines without a float kind hand floats back as integers.
            #[allow(clippy::cast_precision_loss)]
            (TypeDescriptor::F64, Value::Integer(n)) => Ok(FieldValue::F64(*n as f64)),
            (TypeDescriptor::Text, Value::Text(s)) => Ok(FieldValue::Text(s.clone())),
            (TypeDescriptor::Bytes, Value::Bytes(b)) => Ok(FieldValue::Bytes(b.clone())),
            (ty, v) => Err(CodecError::unexpected_kind(self.name(), expected_kind(ty), v.kind())),
        }
    }
}

fn expected_kind(ty: &TypeDescriptor) -> &'static str {
    match ty {
        TypeDescriptor::F64 | TypeDescriptor::F32 => "float",
        TypeDescriptor::Text | TypeDescriptor::Enum { .. } | TypeDescriptor::Json { .. } => "text",
        TypeDescriptor::Bytes => "bytes",
        TypeDescriptor::List(_) | TypeDescriptor::Set(_) => "list",
        TypeDescriptor::Map(_) => "map",
        _ => "integer",
    }
}

/// Stores a timestamp as signed milliseconds since the Unix epoch.
///
/// The accepted domain is millisecond-precision instants; sub-millisecond
/// parts are truncated on write.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampCodec;

impl TimestampCodec {
    fn to_millis(t: SystemTime) -> i64 {
        match t.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_millis()).map_or(i64::MIN, |ms| -ms),
        }
    }

    fn from_millis(ms: i64) -> SystemTime {
        let magnitude = Duration::from_millis(ms.unsigned_abs());
        if ms >= 0 {
            UNIX_EPOCH + magnitude
        } else {
            UNIX_EPOCH - magnitude
        }
    }
}

impl Codec for TimestampCodec {
    fn name(&self) -> &'static str {
        "timestamp-millis"
    }

    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        matches!(ty, TypeDescriptor::Timestamp)
    }

    fn to_storage(&self, _ty: &TypeDescriptor, value: &FieldValue) -> CodecResult<Value> {
        match value {
            FieldValue::Timestamp(t) => Ok(Value::Integer(Self::to_millis(*t))),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn from_storage(&self, _ty: &TypeDescriptor, value: &Value) -> CodecResult<FieldValue> {
        match value {
            Value::Integer(ms) => Ok(FieldValue::Timestamp(Self::from_millis(*ms))),
            v => Err(CodecError::unexpected_kind(self.name(), "integer", v.kind())),
        }
    }
}

/// Widens narrow integers to 64-bit integers and `f32` to 64-bit floats.
///
/// This codec also accepts `i64`, which is why the pass-through codec
/// must be consulted first.
#[derive(Debug, Default, Clone, Copy)]
pub struct WideningCodec;

impl Codec for WideningCodec {
    fn name(&self) -> &'static str {
        "widening"
    }

    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        matches!(
            ty,
            TypeDescriptor::I8
                | TypeDescriptor::I16
                | TypeDescriptor::I32
                | TypeDescriptor::I64
                | TypeDescriptor::F32
        )
    }

    fn to_storage(&self, _ty: &TypeDescriptor, value: &FieldValue) -> CodecResult<Value> {
        match value {
            FieldValue::I8(n) => Ok(Value::Integer(i64::from(*n))),
            FieldValue::I16(n) => Ok(Value::Integer(i64::from(*n))),
            FieldValue::I32(n) => Ok(Value::Integer(i64::from(*n))),
            FieldValue::I64(n) => Ok(Value::Integer(*n)),
            FieldValue::F32(f) => Ok(Value::Float(f64::from(*f))),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn from_storage(&self, ty: &TypeDescriptor, value: &Value) -> CodecResult<FieldValue> {
        match (ty, value) {
            (TypeDescriptor::I8, Value::Integer(n)) => i8::try_from(*n)
                .map(FieldValue::I8)
                .map_err(|_| CodecError::out_of_range(n, "i8")),
            (TypeDescriptor::I16, Value::Integer(n)) => i16::try_from(*n)
                .map(FieldValue::I16)
                .map_err(|_| CodecError::out_of_range(n, "i16")),
            (TypeDescriptor::I32, Value::Integer(n)) => i32::try_from(*n)
                .map(FieldValue::I32)
                .map_err(|_| CodecError::out_of_range(n, "i32")),
            (TypeDescriptor::I64, Value::Integer(n)) => Ok(FieldValue::I64(*n)),
            #[allow(clippy::cast_possible_truncation)]
            (TypeDescriptor::F32, Value::Float(f)) => Ok(FieldValue::F32(*f as f32)),
            (ty, v) => Err(CodecError::unexpected_kind(self.name(), expected_kind(ty), v.kind())),
        }
    }
}

/// Stores booleans as the integers 0 and 1.
///
/// Any non-zero stored integer decodes as `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoolCodec;

impl Codec for BoolCodec {
    fn name(&self) -> &'static str {
        "bool-as-integer"
    }

    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        matches!(ty, TypeDescriptor::Bool)
    }

    fn to_storage(&self, _ty: &TypeDescriptor, value: &FieldValue) -> CodecResult<Value> {
        match value {
            FieldValue::Bool(b) => Ok(Value::Integer(i64::from(*b))),
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn from_storage(&self, _ty: &TypeDescriptor, value: &Value) -> CodecResult<FieldValue> {
        match value {
            Value::Integer(n) => Ok(FieldValue::Bool(*n != 0)),
            v => Err(CodecError::unexpected_kind(self.name(), "integer", v.kind())),
        }
    }
}

/// Stores an enumeration by its variant name.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnumCodec;

impl Codec for EnumCodec {
    fn name(&self) -> &'static str {
        "enum-name"
    }

    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        matches!(ty, TypeDescriptor::Enum { .. })
    }

    fn to_storage(&self, ty: &TypeDescriptor, value: &FieldValue) -> CodecResult<Value> {
        match value {
            FieldValue::Enum(variant) => {
                Self::check_variant(ty, variant)?;
                Ok(Value::Text(variant.clone()))
            }
            other => Err(unexpected(self.name(), other)),
        }
    }

    fn from_storage(&self, ty: &TypeDescriptor, value: &Value) -> CodecResult<FieldValue> {
        let Value::Text(stored) = value else {
            return Err(CodecError::unexpected_kind(self.name(), "text", value.kind()));
        };
        Self::check_variant(ty, stored)?;
        Ok(FieldValue::Enum(stored.clone()))
    }
}

impl EnumCodec {
    /// Fails with `UnknownVariant` unless `ty` declares `variant`.
    fn check_variant(ty: &TypeDescriptor, variant: &str) -> CodecResult<()> {
        match ty {
            TypeDescriptor::Enum { name, variants } if !variants.contains(&variant) => {
                Err(CodecError::UnknownVariant {
                    enum_name: (*name).to_string(),
                    variant: variant.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Stores a fixed-point decimal as the bit pattern of its `f64`
/// approximation.
///
/// This codec is lossy: units beyond 2^53, or scales whose power of ten
/// is not exactly representable, may not survive the round trip. Only
/// the stored `f64` is preserved bit for bit.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedPointCodec;

impl FixedPointCodec {
    fn factor(ty: &TypeDescriptor) -> f64 {
        match ty {
            TypeDescriptor::Fixed { scale } => 10f64.powi(i32::try_from(*scale).unwrap_or(i32::MAX)),
            _ => 1.0,
        }
    }
}

impl Codec for FixedPointCodec {
    fn name(&self) -> &'static str {
        "fixed-as-float-bits"
    }

    fn accepts(&self, ty: &TypeDescriptor) -> bool {
        matches!(ty, TypeDescriptor::Fixed { .. })
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn to_storage(&self, ty: &TypeDescriptor, value: &FieldValue) -> CodecResult<Value> {
        match value {
            FieldValue::Fixed(units) => {
                let approx = *units as f64 / Self::factor(ty);
                Ok(Value::Integer(approx.to_bits() as i64))
            }
            other => Err(unexpected(self.name(), other)),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_storage(&self, ty: &TypeDescriptor, value: &Value) -> CodecResult<FieldValue> {
        match value {
            Value::Integer(bits) => {
                let approx = f64::from_bits(*bits as u64);
                Ok(FieldValue::Fixed((approx * Self::factor(ty)).round() as i64))
            }
            v => Err(CodecError::unexpected_kind(self.name(), "integer", v.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(codec: &dyn Codec, ty: &TypeDescriptor, value: FieldValue) {
        let stored = codec.to_storage(ty, &value).unwrap();
        assert_eq!(codec.from_storage(ty, &stored).unwrap(), value, "{}", codec.name());
    }

    #[test]
    fn pass_through_roundtrips() {
        let c = PassThroughCodec;
        roundtrip(&c, &TypeDescriptor::I64, FieldValue::I64(i64::MIN));
        roundtrip(&c, &TypeDescriptor::F64, FieldValue::F64(-2.75));
        roundtrip(&c, &TypeDescriptor::Text, FieldValue::Text("héllo".into()));
        roundtrip(&c, &TypeDescriptor::Bytes, FieldValue::Bytes(vec![0, 255]));
        roundtrip(&c, &TypeDescriptor::Raw, FieldValue::Raw(Value::List(vec![Value::Integer(1)])));
    }

    #[test]
    fn pass_through_rejects_wrong_kind() {
        let err = PassThroughCodec
            .from_storage(&TypeDescriptor::Text, &Value::Integer(1))
            .unwrap_err();
        assert!(matches!(err, CodecError::UnexpectedKind { expected: "text", found: "integer", .. }));
    }

    #[test]
    fn timestamp_is_epoch_millis() {
        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        let stored = TimestampCodec.to_storage(&TypeDescriptor::Timestamp, &FieldValue::Timestamp(t)).unwrap();
        assert_eq!(stored, Value::Integer(1_700_000_000_123));
        roundtrip(&TimestampCodec, &TypeDescriptor::Timestamp, FieldValue::Timestamp(t));
    }

    #[test]
    fn timestamp_before_epoch() {
        let t = UNIX_EPOCH - Duration::from_millis(86_400_000);
        let stored = TimestampCodec.to_storage(&TypeDescriptor::Timestamp, &FieldValue::Timestamp(t)).unwrap();
        assert_eq!(stored, Value::Integer(-86_400_000));
        roundtrip(&TimestampCodec, &TypeDescriptor::Timestamp, FieldValue::Timestamp(t));
    }

    #[test]
    fn widening_roundtrips_and_checks_range() {
        let c = WideningCodec;
        roundtrip(&c, &TypeDescriptor::I8, FieldValue::I8(-128));
        roundtrip(&c, &TypeDescriptor::I16, FieldValue::I16(i16::MAX));
        roundtrip(&c, &TypeDescriptor::I32, FieldValue::I32(-7));
        roundtrip(&c, &TypeDescriptor::F32, FieldValue::F32(0.1));

        let err = c.from_storage(&TypeDescriptor::I8, &Value::Integer(300)).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { target: "i8", .. }));
    }

    #[test]
    fn bool_is_zero_or_one() {
        assert_eq!(
            BoolCodec.to_storage(&TypeDescriptor::Bool, &FieldValue::Bool(true)).unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            BoolCodec.to_storage(&TypeDescriptor::Bool, &FieldValue::Bool(false)).unwrap(),
            Value::Integer(0)
        );
        roundtrip(&BoolCodec, &TypeDescriptor::Bool, FieldValue::Bool(true));
    }

    #[test]
    fn enum_checks_variants() {
        let ty = TypeDescriptor::Enum {
            name: "Status",
            variants: &["Active", "Closed"],
        };
        roundtrip(&EnumCodec, &ty, FieldValue::Enum("Closed".into()));
        let err = EnumCodec.from_storage(&ty, &Value::Text("Gone".into())).unwrap_err();
        assert!(matches!(err, CodecError::UnknownVariant { .. }));
    }

    #[test]
    fn enum_rejects_undeclared_variant_on_write() {
        let ty = TypeDescriptor::Enum {
            name: "Color",
            variants: &["Red", "Green"],
        };
        let err = EnumCodec
            .to_storage(&ty, &FieldValue::Enum("Purple".into()))
            .unwrap_err();
        match err {
            CodecError::UnknownVariant { enum_name, variant } => {
                assert_eq!(enum_name, "Color");
                assert_eq!(variant, "Purple");
            }
            other => panic!("expected UnknownVariant, got {other:?}"),
        }
        assert_eq!(
            EnumCodec.to_storage(&ty, &FieldValue::Enum("Green".into())).unwrap(),
            Value::Text("Green".into())
        );
    }

    #[test]
    fn fixed_point_is_lossy_beyond_f64_precision() {
        let ty = TypeDescriptor::Fixed { scale: 2 };
        roundtrip(&FixedPointCodec, &ty, FieldValue::Fixed(12_345));

        let stored = FixedPointCodec.to_storage(&ty, &FieldValue::Fixed(12_345)).unwrap();
        let bits = stored.as_integer().unwrap();
        assert_eq!(f64::from_bits(bits as u64), 123.45);

        let huge = FieldValue::Fixed(i64::MAX - 1);
        let stored = FixedPointCodec.to_storage(&ty, &huge).unwrap();
        assert_ne!(FixedPointCodec.from_storage(&ty, &stored).unwrap(), huge);
    }

    mod laws {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn integers_roundtrip(n in any::<i64>(), m in any::<i32>(), s in any::<i16>(), b in any::<i8>()) {
                roundtrip(&PassThroughCodec, &TypeDescriptor::I64, FieldValue::I64(n));
                roundtrip(&WideningCodec, &TypeDescriptor::I32, FieldValue::I32(m));
                roundtrip(&WideningCodec, &TypeDescriptor::I16, FieldValue::I16(s));
                roundtrip(&WideningCodec, &TypeDescriptor::I8, FieldValue::I8(b));
            }

            #[test]
            fn floats_roundtrip_bit_for_bit(f in any::<f64>(), g in any::<f32>().prop_filter("nan payloads may be quieted", |g| !g.is_nan())) {
                let stored = PassThroughCodec.to_storage(&TypeDescriptor::F64, &FieldValue::F64(f)).unwrap();
                prop_assert_eq!(stored, Value::Float(f));
                let stored = WideningCodec.to_storage(&TypeDescriptor::F32, &FieldValue::F32(g)).unwrap();
                match WideningCodec.from_storage(&TypeDescriptor::F32, &stored).unwrap() {
                    FieldValue::F32(back) => prop_assert_eq!(back.to_bits(), g.to_bits()),
                    other => prop_assert!(false, "unexpected {:?}", other),
                }
            }

            #[test]
            fn timestamps_roundtrip_at_millis(ms in -4_000_000_000_000i64..4_000_000_000_000i64) {
                roundtrip(&TimestampCodec, &TypeDescriptor::Timestamp, FieldValue::Timestamp(TimestampCodec::from_millis(ms)));
            }

            #[test]
            fn small_fixed_point_roundtrips(units in -1_000_000_000i64..1_000_000_000i64) {
                roundtrip(&FixedPointCodec, &TypeDescriptor::Fixed { scale: 2 }, FieldValue::Fixed(units));
            }
        }
    }
}
