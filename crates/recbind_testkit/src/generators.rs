//! Property-based test generators using proptest.

use crate::fixtures::{Address, Customer, Status};
use proptest::prelude::*;
use recbind_codec::{AttributeMap, Value};
use std::time::{Duration, UNIX_EPOCH};

/// Strategy for attribute names.
pub fn attribute_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for scalar storage values. Floats are finite.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Integer),
        (-1.0e12f64..1.0e12).prop_map(Value::Float),
        ".{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ]
}

/// Strategy for storage values nested up to three levels.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map(attribute_name_strategy(), inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for record snapshots.
pub fn snapshot_strategy() -> impl Strategy<Value = AttributeMap> {
    prop::collection::btree_map(attribute_name_strategy(), value_strategy(), 0..8)
}

/// Strategy for account statuses.
pub fn status_strategy() -> impl Strategy<Value = Status> {
    prop_oneof![Just(Status::Active), Just(Status::Suspended), Just(Status::Closed)]
}

/// Strategy for addresses.
pub fn address_strategy() -> impl Strategy<Value = Address> {
    ("[A-Za-z0-9 ]{0,24}", "[A-Za-z ]{0,16}", "[A-Z0-9]{0,8}").prop_map(|(street, city, zip)| Address {
        street,
        city,
        zip,
    })
}

/// Strategy for customers with storable values.
///
/// Balances stay within the range the fixed-point codec round-trips
/// exactly; the display field is left empty since it is never stored.
pub fn customer_strategy() -> impl Strategy<Value = Customer> {
    (
        "[a-z0-9]{1,12}",
        ".{0,24}",
        prop::option::of("[a-z]{1,8}@[a-z]{1,8}\\.com"),
        any::<i16>(),
        any::<bool>(),
        status_strategy(),
        -(1i64 << 40)..(1i64 << 40),
        address_strategy(),
        prop::collection::btree_set("[a-z]{1,6}", 0..4),
        prop::collection::vec(any::<i64>(), 0..6),
        0u64..4_000_000_000_000,
    )
        .prop_map(
            |(id, name, email, age, newsletter, status, balance_cents, address, tags, recent_orders, millis)| Customer {
                id,
                name,
                email,
                age,
                newsletter,
                status,
                balance_cents,
                address,
                tags,
                recent_orders,
                created: UNIX_EPOCH + Duration::from_millis(millis),
                ..Customer::default()
            },
        )
}
