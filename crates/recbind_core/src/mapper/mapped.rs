//! Built, immutable type mappings.

use crate::error::{CoreError, CoreResult};
use crate::mapper::schema::{AttributeRole, Getter, Mapped, Schema, Setter};
use recbind_codec::{AttributeMap, Codec, CodecError, CodecRegistry, FieldValue, TypeDescriptor, Value};
use recbind_storage::{Expiration, PrimaryKey, RecordKey};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// One attribute with its codec resolved.
pub struct MappedAttribute<T> {
    name: String,
    storage_name: String,
    ty: TypeDescriptor,
    role: AttributeRole,
    codec: Arc<dyn Codec>,
    getter: Getter<T>,
    setter: Setter<T>,
}

impl<T> MappedAttribute<T> {
    /// In-memory name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used in the stored record.
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// Declared type.
    pub fn declared_type(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// The attribute's role.
    pub fn role(&self) -> AttributeRole {
        self.role
    }

    /// Name of the bound codec.
    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    /// Reads and encodes the attribute; `None` when the value is null.
    fn read(&self, owner: &str, object: &T) -> CoreResult<Option<Value>> {
        match (self.getter)(object) {
            FieldValue::Null => Ok(None),
            value => self
                .codec
                .to_storage(&self.ty, &value)
                .map(Some)
                .map_err(|e| CoreError::attribute(owner, &self.name, e)),
        }
    }

    /// Decodes and writes the attribute.
    fn write(&self, owner: &str, object: &mut T, value: &Value) -> CoreResult<()> {
        self.codec
            .from_storage(&self.ty, value)
            .and_then(|decoded| (self.setter)(object, decoded))
            .map_err(|e| CoreError::attribute(owner, &self.name, e))
    }
}

impl<T> fmt::Debug for MappedAttribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedAttribute")
            .field("name", &self.name)
            .field("storage_name", &self.storage_name)
            .field("ty", &self.ty)
            .field("role", &self.role)
            .field("codec", &self.codec.name())
            .finish_non_exhaustive()
    }
}

/// Location and write metadata carried by an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Value of the primary-key attribute.
    pub key: Option<PrimaryKey>,
    /// Value of the collection-name attribute.
    pub collection: Option<String>,
    /// Value of the generation attribute.
    pub generation: Option<u32>,
    /// Value of the expiration attribute.
    pub expiration: Option<Expiration>,
}

/// The mapping of one type, built once and never mutated.
pub struct MappedType<T> {
    type_name: String,
    namespace: Option<String>,
    collection: Option<String>,
    default_key: Option<PrimaryKey>,
    attributes: Vec<MappedAttribute<T>>,
    by_storage_name: HashMap<String, usize>,
    key: Option<MappedAttribute<T>>,
    generation: Option<MappedAttribute<T>>,
    expiration: Option<MappedAttribute<T>>,
    collection_name: Option<MappedAttribute<T>>,
    catch_all: Option<MappedAttribute<T>>,
}

impl<T: Mapped> MappedType<T> {
    /// Builds the mapping from `T`'s schema, resolving every codec.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedType`] if any mapped attribute has
    /// no codec, or [`CoreError::InvalidSchema`] if the schema breaks a
    /// mapping rule.
    pub fn build(registry: &CodecRegistry) -> CoreResult<Self> {
        Self::from_schema(T::schema(), registry)
    }
}

impl<T> MappedType<T> {
    /// Builds the mapping from an explicit schema.
    ///
    /// # Errors
    ///
    /// See [`MappedType::build`].
    pub fn from_schema(schema: Schema<T>, registry: &CodecRegistry) -> CoreResult<Self> {
        let owner = schema.type_name;
        let mut mapped = Self {
            type_name: owner.clone(),
            namespace: schema.namespace,
            collection: schema.collection,
            default_key: schema.default_key,
            attributes: Vec::new(),
            by_storage_name: HashMap::new(),
            key: None,
            generation: None,
            expiration: None,
            collection_name: None,
            catch_all: None,
        };

        for attribute in schema.attributes.into_iter().filter(|a| !a.skipped) {
            let codec = registry
                .resolve(&attribute.ty, &attribute.options)
                .map_err(|e| match e {
                    CodecError::UnsupportedType { .. } => CoreError::UnsupportedType {
                        owner: owner.clone(),
                        attribute: attribute.name.clone(),
                        declared: attribute.ty.to_string(),
                    },
                    other => CoreError::attribute(&owner, &attribute.name, other),
                })?;

            let resolved = MappedAttribute {
                storage_name: attribute.storage_name.unwrap_or_else(|| attribute.name.clone()),
                name: attribute.name,
                ty: attribute.ty,
                role: attribute.role,
                codec,
                getter: attribute.getter,
                setter: attribute.setter,
            };

            let slot = match resolved.role {
                AttributeRole::Ordinary => {
                    if mapped.by_storage_name.contains_key(&resolved.storage_name) {
                        return Err(CoreError::invalid_schema(
                            &owner,
                            format!("duplicate storage name {:?}", resolved.storage_name),
                        ));
                    }
                    mapped
                        .by_storage_name
                        .insert(resolved.storage_name.clone(), mapped.attributes.len());
                    mapped.attributes.push(resolved);
                    continue;
                }
                AttributeRole::PrimaryKey => &mut mapped.key,
                AttributeRole::Generation => &mut mapped.generation,
                AttributeRole::Expiration => &mut mapped.expiration,
                AttributeRole::CollectionName => &mut mapped.collection_name,
                AttributeRole::CatchAll => {
                    if resolved.ty != TypeDescriptor::map(TypeDescriptor::Raw) {
                        return Err(CoreError::invalid_schema(
                            &owner,
                            format!("catch-all {} must be a map of raw values, not {}", resolved.name, resolved.ty),
                        ));
                    }
                    &mut mapped.catch_all
                }
            };
            if let Some(existing) = slot.as_ref() {
                return Err(CoreError::invalid_schema(
                    &owner,
                    format!(
                        "{} and {} are both flagged {:?}",
                        existing.name, resolved.name, resolved.role
                    ),
                ));
            }
            *slot = Some(resolved);
        }

        trace!(
            type_name = %mapped.type_name,
            attributes = mapped.attributes.len(),
            "built type mapping"
        );
        Ok(mapped)
    }

    /// The type's simple name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Type-level default namespace.
    pub fn default_namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Type-level default collection; falls back to nothing.
    pub fn default_collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// Type-level default key.
    pub fn default_key(&self) -> Option<&PrimaryKey> {
        self.default_key.as_ref()
    }

    /// Ordinary attributes, in declaration order.
    pub fn attributes(&self) -> &[MappedAttribute<T>] {
        &self.attributes
    }

    /// Finds an ordinary attribute by in-memory name.
    pub fn attribute(&self, name: &str) -> Option<&MappedAttribute<T>> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Returns the attribute with `role`, for metadata roles and the
    /// catch-all bag.
    pub fn role_attribute(&self, role: AttributeRole) -> Option<&MappedAttribute<T>> {
        match role {
            AttributeRole::Ordinary => None,
            AttributeRole::PrimaryKey => self.key.as_ref(),
            AttributeRole::Generation => self.generation.as_ref(),
            AttributeRole::Expiration => self.expiration.as_ref(),
            AttributeRole::CollectionName => self.collection_name.as_ref(),
            AttributeRole::CatchAll => self.catch_all.as_ref(),
        }
    }

    /// Extracts the object's full snapshot.
    ///
    /// Null attributes are absent. Entries of the catch-all bag are
    /// merged in under their own names unless a mapped attribute
    /// already uses the name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Attribute`] if a value cannot be encoded.
    pub fn extract(&self, object: &T) -> CoreResult<AttributeMap> {
        let mut snapshot = AttributeMap::new();
        for attribute in &self.attributes {
            if let Some(value) = attribute.read(&self.type_name, object)? {
                snapshot.insert(attribute.storage_name.clone(), value);
            }
        }

        if let Some(bag) = &self.catch_all {
            if let Some(Value::Map(extra)) = bag.read(&self.type_name, object)? {
                for (name, value) in extra {
                    snapshot.entry(name).or_insert(value);
                }
            }
        }
        Ok(snapshot)
    }

    /// Injects stored attributes into the object.
    ///
    /// Stored attributes with no mapped counterpart go to the catch-all
    /// bag if the type has one, and are otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Attribute`] if a value cannot be decoded.
    pub fn inject(&self, object: &mut T, attributes: &AttributeMap) -> CoreResult<()> {
        let mut unmapped = BTreeMap::new();
        for (name, value) in attributes {
            match self.by_storage_name.get(name) {
                Some(&index) => self.attributes[index].write(&self.type_name, object, value)?,
                None if self.catch_all.is_some() => {
                    unmapped.insert(name.clone(), value.clone());
                }
                None => trace!(type_name = %self.type_name, attribute = %name, "ignoring unmapped attribute"),
            }
        }

        if let Some(bag) = &self.catch_all {
            bag.write(&self.type_name, object, &Value::Map(unmapped))?;
        }
        Ok(())
    }

    /// Reads the metadata attributes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Attribute`] if a metadata value has the wrong
    /// shape, e.g. a negative generation.
    pub fn metadata(&self, object: &T) -> CoreResult<ObjectMetadata> {
        let mut meta = ObjectMetadata::default();

        if let Some(attr) = &self.key {
            meta.key = match attr.read(&self.type_name, object)? {
                None => None,
                Some(Value::Text(s)) => Some(PrimaryKey::Text(s)),
                Some(Value::Integer(n)) => Some(PrimaryKey::Integer(n)),
                Some(Value::Bytes(b)) => Some(PrimaryKey::Opaque(b)),
                Some(other) => return Err(self.metadata_error(attr, "key", &other)),
            };
        }
        if let Some(attr) = &self.collection_name {
            meta.collection = match attr.read(&self.type_name, object)? {
                None => None,
                Some(Value::Text(s)) => Some(s),
                Some(other) => return Err(self.metadata_error(attr, "collection name", &other)),
            };
        }
        if let Some(attr) = &self.generation {
            meta.generation = match attr.read(&self.type_name, object)? {
                None => None,
                Some(Value::Integer(n)) => match u32::try_from(n) {
                    Ok(g) => Some(g),
                    Err(_) => return Err(CoreError::attribute(&self.type_name, &attr.name, CodecError::out_of_range(n, "u32"))),
                },
                Some(other) => return Err(self.metadata_error(attr, "generation", &other)),
            };
        }
        if let Some(attr) = &self.expiration {
            meta.expiration = match attr.read(&self.type_name, object)? {
                None => None,
                Some(Value::Integer(ttl)) => Some(Expiration::from_ttl(ttl)),
                Some(other) => return Err(self.metadata_error(attr, "expiration", &other)),
            };
        }
        Ok(meta)
    }

    /// Writes record metadata back into a freshly read object.
    ///
    /// The collection-name attribute receives the collection the record
    /// was read from.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Attribute`] if an attribute cannot hold the
    /// value.
    pub fn inject_metadata(
        &self,
        object: &mut T,
        key: &RecordKey,
        generation: u32,
        expiration: Expiration,
    ) -> CoreResult<()> {
        if let Some(attr) = &self.key {
            let value = match &key.key {
                PrimaryKey::Text(s) => Value::Text(s.clone()),
                PrimaryKey::Integer(n) => Value::Integer(*n),
                PrimaryKey::Opaque(b) => Value::Bytes(b.clone()),
            };
            attr.write(&self.type_name, object, &value)?;
        }
        if let Some(attr) = &self.collection_name {
            attr.write(&self.type_name, object, &Value::Text(key.collection.clone()))?;
        }
        if let Some(attr) = &self.generation {
            attr.write(&self.type_name, object, &Value::Integer(i64::from(generation)))?;
        }
        if let Some(attr) = &self.expiration {
            attr.write(&self.type_name, object, &Value::Integer(expiration.as_ttl()))?;
        }
        Ok(())
    }

    /// Writes `generation` into the generation attribute, if the type
    /// has one. Returns whether it did.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Attribute`] if the attribute cannot hold the
    /// value.
    pub fn inject_generation(&self, object: &mut T, generation: u32) -> CoreResult<bool> {
        match &self.generation {
            Some(attr) => {
                attr.write(&self.type_name, object, &Value::Integer(i64::from(generation)))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn metadata_error(&self, attr: &MappedAttribute<T>, what: &str, found: &Value) -> CoreError {
        CoreError::attribute(
            &self.type_name,
            &attr.name,
            CodecError::unexpected_value(attr.codec.name(), format!("{} cannot be used as {what}", found.kind())),
        )
    }
}

impl<T> fmt::Debug for MappedType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedType")
            .field("type_name", &self.type_name)
            .field("namespace", &self.namespace)
            .field("collection", &self.collection)
            .field("attributes", &self.attributes)
            .field("key", &self.key.as_ref().map(|a| &a.name))
            .finish_non_exhaustive()
    }
}
