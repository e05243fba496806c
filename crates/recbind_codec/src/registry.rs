//! Codec selection by declared type.

use crate::codec::{
    BoolCodec, Codec, EnumCodec, FixedPointCodec, PassThroughCodec, TimestampCodec, WideningCodec,
};
use crate::collection::CollectionCodec;
use crate::error::{CodecError, CodecResult};
use crate::json::JsonCodec;
use crate::native::TypeDescriptor;
use std::fmt;
use std::sync::Arc;

/// Per-attribute options that influence codec selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeOptions {
    /// Serialize the whole attribute as a JSON document.
    pub json: bool,
}

impl AttributeOptions {
    /// Options for an attribute marked "serialize as JSON".
    pub const fn json() -> Self {
        Self { json: true }
    }
}

/// Resolves a codec for a declared attribute type.
///
/// Resolution order:
///
/// 1. Attributes marked JSON, and JSON-declared types, get the JSON codec.
/// 2. Lists, maps and sets get a [`CollectionCodec`] around the element
///    type's codec, resolved recursively.
/// 3. Registered custom codecs, in registration order.
/// 4. Built-in codecs in fixed priority order: pass-through, timestamp,
///    widening, bool, enum, fixed-point. The first acceptor wins.
/// 5. The fallback codec, if one is configured.
pub struct CodecRegistry {
    custom: Vec<Arc<dyn Codec>>,
    builtins: Vec<Arc<dyn Codec>>,
    json: Arc<dyn Codec>,
    fallback: Option<Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// Creates a registry holding only the built-in codecs.
    pub fn new() -> Self {
        Self {
            custom: Vec::new(),
            builtins: vec![
                Arc::new(PassThroughCodec),
                Arc::new(TimestampCodec),
                Arc::new(WideningCodec),
                Arc::new(BoolCodec),
                Arc::new(EnumCodec),
                Arc::new(FixedPointCodec),
            ],
            json: Arc::new(JsonCodec),
            fallback: None,
        }
    }

    /// Sets the codec used when nothing else accepts a type.
    #[must_use]
    pub fn with_fallback(mut self, codec: Arc<dyn Codec>) -> Self {
        self.fallback = Some(codec);
        self
    }

    /// Uses the JSON codec as the fallback.
    #[must_use]
    pub fn with_json_fallback(self) -> Self {
        let json = Arc::clone(&self.json);
        self.with_fallback(json)
    }

    /// Registers a custom codec, consulted before the built-ins.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.custom.push(codec);
    }

    /// Returns true if a fallback codec is configured.
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Resolves the codec for `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedType`] if no codec accepts the
    /// type (or a collection's element type) and no fallback is set.
    pub fn resolve(&self, ty: &TypeDescriptor, options: &AttributeOptions) -> CodecResult<Arc<dyn Codec>> {
        if options.json || self.json.accepts(ty) {
            return Ok(Arc::clone(&self.json));
        }

        if let Some(element) = ty.element() {
            let element_codec = self.resolve(element, &AttributeOptions::default())?;
            return Ok(Arc::new(CollectionCodec::new(element_codec)));
        }

        self.custom
            .iter()
            .chain(self.builtins.iter())
            .find(|codec| codec.accepts(ty))
            .or(self.fallback.as_ref())
            .map(Arc::clone)
            .ok_or_else(|| CodecError::unsupported_type(ty.to_string()))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |codecs: &[Arc<dyn Codec>]| codecs.iter().map(|c| c.name()).collect::<Vec<_>>();
        f.debug_struct("CodecRegistry")
            .field("custom", &names(&self.custom))
            .field("builtins", &names(&self.builtins))
            .field("fallback", &self.fallback.as_ref().map(|c| c.name()))
            .finish()
    }
}
