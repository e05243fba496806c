//! Mapped fixture types and session helpers.
//!
//! The fixtures cover every built-in codec: widened integers, booleans,
//! timestamps, enumerations, fixed-point amounts, JSON documents, lists,
//! sets and a catch-all bag.

use recbind_codec::{CodecError, FieldValue, TypeDescriptor, Value};
use recbind_core::{Attribute, MapperConfig, Mapped, Schema, Session};
use recbind_storage::InMemoryClient;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Namespace used by [`TestSession`].
pub const TEST_NAMESPACE: &str = "test";

/// Account status, stored by variant name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Status {
    /// Open for business.
    #[default]
    Active,
    /// Temporarily blocked.
    Suspended,
    /// Permanently closed.
    Closed,
}

impl Status {
    /// Variant names in declaration order.
    pub const VARIANTS: &'static [&'static str] = &["Active", "Suspended", "Closed"];

    /// The declared type of a status attribute.
    pub const fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Enum {
            name: "Status",
            variants: Self::VARIANTS,
        }
    }

    /// The variant name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Suspended => "Suspended",
            Self::Closed => "Closed",
        }
    }
}

impl From<Status> for FieldValue {
    fn from(status: Status) -> Self {
        FieldValue::Enum(status.name().to_string())
    }
}

impl TryFrom<FieldValue> for Status {
    type Error = CodecError;

    fn try_from(value: FieldValue) -> Result<Self, CodecError> {
        match value {
            FieldValue::Enum(name) => match name.as_str() {
                "Active" => Ok(Self::Active),
                "Suspended" => Ok(Self::Suspended),
                "Closed" => Ok(Self::Closed),
                _ => Err(CodecError::UnknownVariant {
                    enum_name: "Status".into(),
                    variant: name,
                }),
            },
            other => Err(CodecError::unexpected_value("enum-name", other.label())),
        }
    }
}

/// A postal address, stored as a JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street and number.
    pub street: String,
    /// City.
    pub city: String,
    /// Postal code.
    pub zip: String,
}

/// A customer record exercising every codec and metadata role.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    /// Primary key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional e-mail, stored as `mail`.
    pub email: Option<String>,
    /// Age, widened to a 64-bit integer.
    pub age: i16,
    /// Whether the customer opted in to newsletters.
    pub newsletter: bool,
    /// Account status.
    pub status: Status,
    /// Balance in cents, stored through the lossy fixed-point codec.
    pub balance_cents: i64,
    /// Postal address.
    pub address: Address,
    /// Free-form tags.
    pub tags: BTreeSet<String>,
    /// Recent order numbers.
    pub recent_orders: Vec<i64>,
    /// Creation time, stored as epoch milliseconds.
    pub created: SystemTime,
    /// Generation counter.
    pub generation: u32,
    /// Time to live in seconds (`0` = namespace default).
    pub ttl: i64,
    /// Derived display string; never stored.
    pub display: String,
    /// Stored attributes no other field maps.
    pub extra: BTreeMap<String, Value>,
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            email: None,
            age: 0,
            newsletter: false,
            status: Status::default(),
            balance_cents: 0,
            address: Address::default(),
            tags: BTreeSet::new(),
            recent_orders: Vec::new(),
            created: UNIX_EPOCH,
            generation: 0,
            ttl: 0,
            display: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl Customer {
    /// A fully populated sample customer.
    pub fn sample(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: "Ada Lovelace".into(),
            email: Some("ada@example.com".into()),
            age: 36,
            newsletter: true,
            status: Status::Active,
            balance_cents: 12_345,
            address: Address {
                street: "12 St James's Square".into(),
                city: "London".into(),
                zip: "SW1Y 4JH".into(),
            },
            tags: ["vip", "early"].into_iter().map(String::from).collect(),
            recent_orders: vec![1001, 1002],
            created: UNIX_EPOCH + Duration::from_millis(1_700_000_000_000),
            generation: 0,
            ttl: 0,
            display: "Ada (vip)".into(),
            extra: BTreeMap::new(),
        }
    }
}

impl Mapped for Customer {
    fn schema() -> Schema<Self> {
        Schema::new()
            .collection("customers")
            .attribute(
                Attribute::new("id", TypeDescriptor::Text, |c: &Customer| c.id.clone().into(), |c, v| {
                    c.id = v.try_into()?;
                    Ok(())
                })
                .primary_key(),
            )
            .attribute(Attribute::new("name", TypeDescriptor::Text, |c: &Customer| c.name.clone().into(), |c, v| {
                c.name = v.try_into()?;
                Ok(())
            }))
            .attribute(
                Attribute::new("email", TypeDescriptor::Text, |c: &Customer| c.email.clone().into(), |c, v| {
                    c.email = v.into_option()?;
                    Ok(())
                })
                .storage_name("mail"),
            )
            .attribute(Attribute::new("age", TypeDescriptor::I16, |c: &Customer| c.age.into(), |c, v| {
                c.age = v.try_into()?;
                Ok(())
            }))
            .attribute(Attribute::new(
                "newsletter",
                TypeDescriptor::Bool,
                |c: &Customer| c.newsletter.into(),
                |c, v| {
                    c.newsletter = v.try_into()?;
                    Ok(())
                },
            ))
            .attribute(Attribute::new("status", Status::descriptor(), |c: &Customer| c.status.into(), |c, v| {
                c.status = v.try_into()?;
                Ok(())
            }))
            .attribute(Attribute::new(
                "balance",
                TypeDescriptor::Fixed { scale: 2 },
                |c: &Customer| FieldValue::Fixed(c.balance_cents),
                |c, v| match v {
                    FieldValue::Fixed(units) => {
                        c.balance_cents = units;
                        Ok(())
                    }
                    other => Err(CodecError::unexpected_value("fixed-as-float-bits", other.label())),
                },
            ))
            .attribute(Attribute::new(
                "address",
                TypeDescriptor::Json { type_name: "Address" },
                |c: &Customer| FieldValue::json(&c.address).unwrap_or(FieldValue::Null),
                |c, v| {
                    c.address = v.from_json()?;
                    Ok(())
                },
            ))
            .attribute(Attribute::new(
                "tags",
                TypeDescriptor::set(TypeDescriptor::Text),
                |c: &Customer| FieldValue::Set(c.tags.iter().cloned().map(FieldValue::Text).collect()),
                |c, v| {
                    c.tags = v.into_vec::<String>()?.into_iter().collect();
                    Ok(())
                },
            ))
            .attribute(Attribute::new(
                "recent_orders",
                TypeDescriptor::list(TypeDescriptor::I64),
                |c: &Customer| FieldValue::list(c.recent_orders.clone()),
                |c, v| {
                    c.recent_orders = v.into_vec()?;
                    Ok(())
                },
            ))
            .attribute(Attribute::new(
                "created",
                TypeDescriptor::Timestamp,
                |c: &Customer| c.created.into(),
                |c, v| {
                    c.created = v.try_into()?;
                    Ok(())
                },
            ))
            .attribute(
                Attribute::new(
                    "generation",
                    TypeDescriptor::I64,
                    |c: &Customer| i64::from(c.generation).into(),
                    |c, v| {
                        let n: i64 = v.try_into()?;
                        c.generation = u32::try_from(n).map_err(|_| CodecError::out_of_range(n, "u32"))?;
                        Ok(())
                    },
                )
                .generation(),
            )
            .attribute(
                Attribute::new("ttl", TypeDescriptor::I64, |c: &Customer| c.ttl.into(), |c, v| {
                    c.ttl = v.try_into()?;
                    Ok(())
                })
                .expiration(),
            )
            .attribute(
                Attribute::new("display", TypeDescriptor::Text, |c: &Customer| c.display.clone().into(), |c, v| {
                    c.display = v.try_into()?;
                    Ok(())
                })
                .transient(),
            )
            .attribute(
                Attribute::new(
                    "extra",
                    TypeDescriptor::map(TypeDescriptor::Raw),
                    |c: &Customer| FieldValue::Map(c.extra.iter().map(|(k, v)| (k.clone(), FieldValue::Raw(v.clone()))).collect()),
                    |c, v| {
                        c.extra = v.into_map()?;
                        Ok(())
                    },
                )
                .catch_all(),
            )
    }
}

/// A log entry routed to a per-object collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    /// Sequence number, used as the key.
    pub seq: i64,
    /// Target collection; falls back to the type default when `None`.
    pub stream: Option<String>,
    /// Payload.
    pub message: String,
}

impl Mapped for Event {
    fn schema() -> Schema<Self> {
        Schema::new()
            .namespace("events")
            .attribute(
                Attribute::new("seq", TypeDescriptor::I64, |e: &Event| e.seq.into(), |e, v| {
                    e.seq = v.try_into()?;
                    Ok(())
                })
                .primary_key(),
            )
            .attribute(
                Attribute::new("stream", TypeDescriptor::Text, |e: &Event| e.stream.clone().into(), |e, v| {
                    e.stream = v.into_option()?;
                    Ok(())
                })
                .collection_name(),
            )
            .attribute(Attribute::new(
                "message",
                TypeDescriptor::Text,
                |e: &Event| e.message.clone().into(),
                |e, v| {
                    e.message = v.try_into()?;
                    Ok(())
                },
            ))
    }
}

/// Process-wide settings stored as a single record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    /// Maintenance mode flag.
    pub maintenance: bool,
    /// Maximum concurrent sessions.
    pub max_sessions: i32,
}

impl Mapped for Settings {
    fn schema() -> Schema<Self> {
        Schema::new()
            .collection("settings")
            .default_key("global")
            .attribute(Attribute::new(
                "maintenance",
                TypeDescriptor::Bool,
                |s: &Settings| s.maintenance.into(),
                |s, v| {
                    s.maintenance = v.try_into()?;
                    Ok(())
                },
            ))
            .attribute(Attribute::new(
                "max_sessions",
                TypeDescriptor::I32,
                |s: &Settings| s.max_sessions.into(),
                |s, v| {
                    s.max_sessions = v.try_into()?;
                    Ok(())
                },
            ))
    }
}

/// A session over an [`InMemoryClient`], keeping the client reachable
/// for call counting and failure injection.
pub struct TestSession {
    /// The session under test.
    pub session: Session,
    /// The client behind it.
    pub client: Arc<InMemoryClient>,
}

impl TestSession {
    /// Creates a session in [`TEST_NAMESPACE`].
    pub fn new() -> Self {
        Self::with_config(MapperConfig::new().default_namespace(TEST_NAMESPACE))
    }

    /// Creates a session with `config`.
    pub fn with_config(config: MapperConfig) -> Self {
        let client = Arc::new(InMemoryClient::new());
        Self {
            session: Session::new(client.clone(), config),
            client,
        }
    }

    /// Opens a second session over the same client, with its own cache.
    pub fn sibling(&self) -> Session {
        Session::new(self.client.clone(), self.session.config().clone())
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

/// Runs `f` with a fresh [`TestSession`].
///
/// # Example
///
/// ```rust
/// use recbind_testkit::{with_session, Customer};
///
/// with_session(|s| {
///     s.save(&Customer::sample("c1")).unwrap();
///     assert_eq!(s.client.record_count(), 1);
/// });
/// ```
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&TestSession) -> R,
{
    let session = TestSession::new();
    f(&session)
}
