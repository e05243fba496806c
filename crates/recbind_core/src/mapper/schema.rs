//! Schema registration for mapped types.

use recbind_codec::{AttributeOptions, CodecResult, FieldValue, TypeDescriptor};
use recbind_storage::PrimaryKey;
use std::sync::Arc;

/// Reads an attribute's current value from an object.
pub type Getter<T> = Arc<dyn Fn(&T) -> FieldValue + Send + Sync>;

/// Writes a decoded attribute value into an object.
pub type Setter<T> = Arc<dyn Fn(&mut T, FieldValue) -> CodecResult<()> + Send + Sync>;

/// Types that can be mapped to records.
///
/// Instead of reflecting over fields, a type describes its attributes
/// once through [`Schema`]. The mapper builds a
/// [`MappedType`](crate::MappedType) from that description on first
/// use and caches it.
///
/// # Example
///
/// ```rust
/// use recbind_codec::TypeDescriptor;
/// use recbind_core::{Attribute, Mapped, Schema};
///
/// #[derive(Default)]
/// struct User {
///     id: String,
///     age: i32,
/// }
///
/// impl Mapped for User {
///     fn schema() -> Schema<Self> {
///         Schema::new()
///             .collection("users")
///             .attribute(
///                 Attribute::new("id", TypeDescriptor::Text, |u: &User| u.id.clone().into(), |u, v| {
///                     u.id = v.try_into()?;
///                     Ok(())
///                 })
///                 .primary_key(),
///             )
///             .attribute(Attribute::new("age", TypeDescriptor::I32, |u: &User| u.age.into(), |u, v| {
///                 u.age = v.try_into()?;
///                 Ok(())
///             }))
///     }
/// }
/// ```
pub trait Mapped: Default + Send + Sync + 'static {
    /// Describes this type's attributes and location defaults.
    fn schema() -> Schema<Self>;
}

/// What an attribute means to the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeRole {
    /// An ordinary stored attribute, part of the snapshot.
    Ordinary,
    /// The record's primary key.
    PrimaryKey,
    /// The record's generation counter.
    Generation,
    /// The record's time-to-live, in seconds.
    Expiration,
    /// Overrides the collection the object is stored in.
    CollectionName,
    /// Receives stored attributes no other attribute maps.
    CatchAll,
}

impl AttributeRole {
    /// Returns true for roles handled outside the snapshot.
    pub fn is_metadata(self) -> bool {
        !matches!(self, Self::Ordinary | Self::CatchAll)
    }
}

/// One attribute of a schema.
pub struct Attribute<T> {
    pub(crate) name: String,
    pub(crate) storage_name: Option<String>,
    pub(crate) ty: TypeDescriptor,
    pub(crate) options: AttributeOptions,
    pub(crate) role: AttributeRole,
    pub(crate) skipped: bool,
    pub(crate) getter: Getter<T>,
    pub(crate) setter: Setter<T>,
}

impl<T> Attribute<T> {
    /// Declares an attribute with its type and accessors.
    pub fn new<G, S>(name: impl Into<String>, ty: TypeDescriptor, getter: G, setter: S) -> Self
    where
        G: Fn(&T) -> FieldValue + Send + Sync + 'static,
        S: Fn(&mut T, FieldValue) -> CodecResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            storage_name: None,
            ty,
            options: AttributeOptions::default(),
            role: AttributeRole::Ordinary,
            skipped: false,
            getter: Arc::new(getter),
            setter: Arc::new(setter),
        }
    }

    /// Stores the attribute under a different name.
    #[must_use]
    pub fn storage_name(mut self, name: impl Into<String>) -> Self {
        self.storage_name = Some(name.into());
        self
    }

    /// Serializes the whole attribute as a JSON document.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.options = AttributeOptions::json();
        self
    }

    /// Leaves the attribute out of the mapping.
    #[must_use]
    pub fn ignored(mut self) -> Self {
        self.skipped = true;
        self
    }

    /// Marks a derived or runtime-only attribute; it is not mapped.
    #[must_use]
    pub fn transient(self) -> Self {
        self.ignored()
    }

    /// Marks the primary key.
    #[must_use]
    pub fn primary_key(self) -> Self {
        self.role(AttributeRole::PrimaryKey)
    }

    /// Marks the generation counter.
    #[must_use]
    pub fn generation(self) -> Self {
        self.role(AttributeRole::Generation)
    }

    /// Marks the expiration (TTL seconds) attribute.
    #[must_use]
    pub fn expiration(self) -> Self {
        self.role(AttributeRole::Expiration)
    }

    /// Marks the attribute carrying the object's collection name.
    #[must_use]
    pub fn collection_name(self) -> Self {
        self.role(AttributeRole::CollectionName)
    }

    /// Marks the catch-all bag. Its declared type must be a map of raw
    /// values.
    #[must_use]
    pub fn catch_all(self) -> Self {
        self.role(AttributeRole::CatchAll)
    }

    fn role(mut self, role: AttributeRole) -> Self {
        self.role = role;
        self
    }

    /// The attribute's in-memory name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A type's mapping description, built through method chaining.
pub struct Schema<T> {
    pub(crate) type_name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) collection: Option<String>,
    pub(crate) default_key: Option<PrimaryKey>,
    pub(crate) attributes: Vec<Attribute<T>>,
}

impl<T> Schema<T> {
    /// Starts a schema named after `T`'s simple type name.
    pub fn new() -> Self {
        let full = std::any::type_name::<T>();
        let simple = full.split('<').next().unwrap_or(full);
        let simple = simple.rsplit("::").next().unwrap_or(simple);
        Self {
            type_name: simple.to_string(),
            namespace: None,
            collection: None,
            default_key: None,
            attributes: Vec::new(),
        }
    }

    /// Overrides the type name used in errors and as the fallback
    /// collection name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.type_name = name.into();
        self
    }

    /// Sets the type-level default namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the type-level default collection.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Sets a type-level default key, for singleton records.
    #[must_use]
    pub fn default_key(mut self, key: impl Into<PrimaryKey>) -> Self {
        self.default_key = Some(key.into());
        self
    }

    /// Adds an attribute. Attribute order is significant.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute<T>) -> Self {
        self.attributes.push(attribute);
        self
    }
}

impl<T> Default for Schema<T> {
    fn default() -> Self {
        Self::new()
    }
}
