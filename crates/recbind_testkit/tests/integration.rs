//! End-to-end tests through the session facade.

use recbind_codec::{AttributeMap, Value};
use recbind_core::{CoreError, LocationOverrides, MapperConfig};
use recbind_storage::{Expiration, RecordKey, StorageClient, StorageError, WritePolicy};
use recbind_testkit::prelude::*;
use std::collections::BTreeMap;

fn customer_key(id: &str) -> RecordKey {
    RecordKey::new(TEST_NAMESPACE, "customers", id)
}

fn stored(s: &TestSession, key: &RecordKey) -> AttributeMap {
    s.client.get(key).unwrap().expect("record exists").attributes
}

#[test]
fn save_then_load_restores_every_attribute() {
    with_session(|s| {
        let customer = Customer::sample("c1");
        s.save(&customer).unwrap();

        let loaded: Customer = s.load("c1").unwrap().unwrap();
        let expected = Customer {
            generation: 1,
            display: String::new(),
            ..customer
        };
        assert_eq!(loaded, expected);
    });
}

#[test]
fn stored_record_uses_storage_names_and_skips_metadata() {
    with_session(|s| {
        s.save(&Customer::sample("c1")).unwrap();
        let attrs = stored(s, &customer_key("c1"));

        assert!(attrs.contains_key("mail"));
        assert!(!attrs.contains_key("email"));
        assert!(!attrs.contains_key("display"));
        assert!(!attrs.contains_key("id"));
        assert!(!attrs.contains_key("generation"));
        assert_eq!(attrs.get("age"), Some(&Value::Integer(36)));
        assert_eq!(attrs.get("newsletter"), Some(&Value::Integer(1)));
        assert_eq!(attrs.get("status"), Some(&Value::Text("Active".into())));
        assert_eq!(attrs.get("created"), Some(&Value::Integer(1_700_000_000_000)));
        assert!(attrs.get("address").and_then(Value::as_text).is_some());
    });
}

#[test]
fn none_attributes_are_not_written() {
    with_session(|s| {
        let customer = Customer {
            email: None,
            ..Customer::sample("c1")
        };
        let outcome = s.save(&customer).unwrap();
        assert!(!outcome.written.contains_key("mail"));

        let loaded: Customer = s.load("c1").unwrap().unwrap();
        assert_eq!(loaded.email, None);
    });
}

#[test]
fn second_save_writes_only_the_delta() {
    with_session(|s| {
        let mut customer = Customer::sample("c1");
        let first = s.save(&customer).unwrap();
        assert!(first.written.len() > 5);

        customer.age = 37;
        customer.tags.insert("loyal".into());
        let second = s.save(&customer).unwrap();
        let names: Vec<_> = second.written.keys().cloned().collect();
        assert_eq!(names, vec!["age".to_string(), "tags".to_string()]);

        let loaded: Customer = s.load("c1").unwrap().unwrap();
        assert_eq!(loaded.age, 37);
        assert!(loaded.tags.contains("loyal"));
        assert_eq!(loaded.name, customer.name);
    });
}

#[test]
fn unchanged_save_makes_no_storage_call() {
    with_session(|s| {
        let customer = Customer::sample("c1");
        s.save(&customer).unwrap();
        s.client.reset_call_count();

        let outcome = s.save(&customer).unwrap();
        assert!(outcome.is_skipped());
        assert_eq!(s.client.call_count(), 0);
    });
}

#[test]
fn transient_changes_are_not_writes() {
    with_session(|s| {
        let mut customer = Customer::sample("c1");
        s.save(&customer).unwrap();
        customer.display = "changed".into();
        assert!(s.save(&customer).unwrap().is_skipped());
    });
}

#[test]
fn load_seeds_the_delta_baseline() {
    let s = TestSession::new();
    s.save(&Customer::sample("c1")).unwrap();

    let other = s.sibling();
    let mut loaded: Customer = other.load("c1").unwrap().unwrap();
    loaded.name = "Augusta".into();
    let outcome = other.save(&loaded).unwrap();
    assert_eq!(outcome.written.keys().collect::<Vec<_>>(), vec!["name"]);
}

#[test]
fn unseen_record_is_written_in_full() {
    let s = TestSession::new();
    let customer = Customer::sample("c1");
    let full = s.save(&customer).unwrap().written;

    let other = s.sibling();
    assert_eq!(other.save(&customer).unwrap().written, full);
}

#[test]
fn failed_put_forgets_the_baseline() {
    with_session(|s| {
        let mut customer = Customer::sample("c1");
        let full = s.save(&customer).unwrap().written;

        customer.age = 40;
        s.client.fail_next_put("disk full");
        let err = s.save(&customer).unwrap_err();
        assert!(matches!(err, CoreError::Storage(StorageError::Engine(_))));

        let retry = s.save(&customer).unwrap();
        assert_eq!(retry.written.len(), full.len());
        assert_eq!(retry.written.get("age"), Some(&Value::Integer(40)));
    });
}

#[test]
fn stale_generation_is_rejected() {
    let s = TestSession::new();
    s.save(&Customer::sample("c1")).unwrap();

    let other = s.sibling();
    let mut mine: Customer = s.load("c1").unwrap().unwrap();
    let mut theirs: Customer = other.load("c1").unwrap().unwrap();
    assert_eq!(mine.generation, 1);

    mine.age = 50;
    s.save(&mine).unwrap();

    theirs.age = 60;
    let err = other.save(&theirs).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Storage(StorageError::GenerationMismatch { expected: 1, actual: 2 })
    ));

    let refreshed: Customer = other.load("c1").unwrap().unwrap();
    assert_eq!(refreshed.age, 50);
    assert_eq!(refreshed.generation, 2);
}

#[test]
fn save_mut_allows_repeated_saves_of_a_loaded_object() {
    with_session(|s| {
        s.save(&Customer::sample("c1")).unwrap();
        let mut loaded: Customer = s.load("c1").unwrap().unwrap();
        assert_eq!(loaded.generation, 1);

        loaded.age = 50;
        s.save_mut(&mut loaded).unwrap();
        loaded.age = 51;
        let outcome = s.save_mut(&mut loaded).unwrap();

        assert_eq!(outcome.generation, Some(3));
        assert_eq!(loaded.generation, 3);
        assert_eq!(s.client.get(&customer_key("c1")).unwrap().unwrap().generation, 3);
    });
}

#[test]
fn ttl_attribute_sets_expiration() {
    with_session(|s| {
        let customer = Customer {
            ttl: 3600,
            ..Customer::sample("c1")
        };
        s.save(&customer).unwrap();
        assert_eq!(s.client.get(&customer_key("c1")).unwrap().unwrap().expiration, Expiration::Seconds(3600));

        let loaded: Customer = s.load("c1").unwrap().unwrap();
        assert_eq!(loaded.ttl, 3600);

        let forever = Customer {
            ttl: -1,
            name: "renamed".into(),
            ..Customer::sample("c2")
        };
        s.save(&forever).unwrap();
        assert_eq!(s.client.get(&customer_key("c2")).unwrap().unwrap().expiration, Expiration::Never);
    });
}

#[test]
fn ttl_only_change_is_written() {
    with_session(|s| {
        let mut customer = Customer::sample("c1");
        s.save(&customer).unwrap();
        assert_eq!(
            s.client.get(&customer_key("c1")).unwrap().unwrap().expiration,
            Expiration::NamespaceDefault
        );

        customer.ttl = 3600;
        let outcome = s.save(&customer).unwrap();
        assert!(!outcome.is_skipped());
        assert!(outcome.written.is_empty());
        assert_eq!(s.client.get(&customer_key("c1")).unwrap().unwrap().expiration, Expiration::Seconds(3600));

        // A loaded record's expiration is the baseline too.
        let mut loaded: Customer = s.load("c1").unwrap().unwrap();
        assert!(s.save(&loaded).unwrap().is_skipped());
        loaded.ttl = -1;
        s.save_mut(&mut loaded).unwrap();
        assert_eq!(s.client.get(&customer_key("c1")).unwrap().unwrap().expiration, Expiration::Never);
    });
}

#[test]
fn unmapped_attributes_land_in_catch_all() {
    with_session(|s| {
        let key = customer_key("c1");
        let mut attrs = AttributeMap::new();
        attrs.insert("name".into(), Value::Text("Ada".into()));
        attrs.insert("legacy_score".into(), Value::Integer(99));
        s.client.put(&key, &attrs, &WritePolicy::default()).unwrap();

        let mut loaded: Customer = s.load("c1").unwrap().unwrap();
        assert_eq!(loaded.extra.get("legacy_score"), Some(&Value::Integer(99)));

        loaded.name = "Ada L.".into();
        let outcome = s.save(&loaded).unwrap();
        assert!(!outcome.written.contains_key("legacy_score"));
        assert_eq!(stored(s, &key).get("legacy_score"), Some(&Value::Integer(99)));
    });
}

#[test]
fn mapped_attribute_wins_over_catch_all_entry() {
    with_session(|s| {
        let mut customer = Customer::sample("c1");
        customer.extra.insert("name".into(), Value::Text("shadow".into()));
        customer.extra.insert("note".into(), Value::Text("kept".into()));

        let outcome = s.save(&customer).unwrap();
        assert_eq!(outcome.written.get("name"), Some(&Value::Text("Ada Lovelace".into())));
        assert_eq!(outcome.written.get("note"), Some(&Value::Text("kept".into())));
    });
}

#[test]
fn native_address_from_older_records_decodes() {
    with_session(|s| {
        let key = customer_key("c1");
        let mut address = BTreeMap::new();
        address.insert("street".to_string(), Value::Text("1 Main St".into()));
        address.insert("city".to_string(), Value::Text("Springfield".into()));
        address.insert("zip".to_string(), Value::Text("12345".into()));
        let mut attrs = AttributeMap::new();
        attrs.insert("address".into(), Value::Map(address));
        s.client.put(&key, &attrs, &WritePolicy::default()).unwrap();

        let loaded: Customer = s.load("c1").unwrap().unwrap();
        assert_eq!(loaded.address.city, "Springfield");

        let outcome = s.save(&loaded).unwrap();
        assert!(outcome.written.get("address").and_then(Value::as_text).is_some());
    });
}

#[test]
fn undecodable_value_names_the_attribute() {
    with_session(|s| {
        let mut attrs = AttributeMap::new();
        attrs.insert("status".into(), Value::Text("Deleted".into()));
        s.client.put(&customer_key("c1"), &attrs, &WritePolicy::default()).unwrap();

        match s.load::<Customer>("c1") {
            Err(CoreError::Attribute { owner, attribute, .. }) => {
                assert_eq!(owner, "Customer");
                assert_eq!(attribute, "status");
            }
            other => panic!("expected attribute error, got {other:?}"),
        }
    });
}

#[test]
fn missing_record_loads_as_none() {
    with_session(|s| {
        assert!(s.load::<Customer>("nobody").unwrap().is_none());
    });
}

#[test]
fn delete_removes_record_and_baseline() {
    with_session(|s| {
        let customer = Customer::sample("c1");
        s.save(&customer).unwrap();
        let key = s.locate(&customer).unwrap();

        assert!(s.delete(&customer).unwrap());
        assert!(s.cache().get(&key).is_none());
        assert!(s.load::<Customer>("c1").unwrap().is_none());
        assert!(!s.delete(&customer).unwrap());

        let outcome = s.save(&customer).unwrap();
        assert!(!outcome.is_skipped());
    });
}

#[test]
fn collection_attribute_routes_the_record() {
    with_session(|s| {
        let event = Event {
            seq: 7,
            stream: Some("audit".into()),
            message: "login".into(),
        };
        let key = s.save(&event).unwrap().key;
        assert_eq!(key, RecordKey::new("events", "audit", 7_i64));

        let loaded: Event = s
            .load_with(&LocationOverrides::new().collection("audit").key(7_i64))
            .unwrap()
            .unwrap();
        assert_eq!(loaded, event);
    });
}

#[test]
fn collection_falls_back_to_type_name() {
    with_session(|s| {
        let event = Event {
            seq: 1,
            stream: None,
            message: "boot".into(),
        };
        let key = s.locate(&event).unwrap();
        assert_eq!(key.collection, s.map_of::<Event>().unwrap().type_name());
        assert_eq!(key.namespace, "events");
    });
}

#[test]
fn overrides_take_precedence() {
    with_session(|s| {
        let event = Event {
            seq: 3,
            stream: Some("audit".into()),
            message: String::new(),
        };
        let overrides = LocationOverrides::new().namespace("archive").collection("cold").key(30_i64);
        let key = s.locate_with(&event, &overrides).unwrap();
        assert_eq!(key, RecordKey::new("archive", "cold", 30_i64));
    });
}

#[test]
fn default_key_addresses_singletons() {
    with_session(|s| {
        let settings = Settings {
            maintenance: true,
            max_sessions: 64,
        };
        let key = s.save(&settings).unwrap().key;
        assert_eq!(key, RecordKey::new(TEST_NAMESPACE, "settings", "global"));

        let loaded: Settings = s.load_with(&LocationOverrides::new()).unwrap().unwrap();
        assert_eq!(loaded, settings);

        assert!(s.delete_with::<Settings>(&LocationOverrides::new()).unwrap());
        assert!(s.load_with::<Settings>(&LocationOverrides::new()).unwrap().is_none());
    });
}

#[test]
fn missing_namespace_is_reported() {
    let s = TestSession::with_config(MapperConfig::new());
    assert!(matches!(
        s.save(&Customer::sample("c1")),
        Err(CoreError::MissingNamespace { .. })
    ));
    assert_eq!(s.client.call_count(), 0);
}

#[test]
fn save_all_writes_each_object() {
    with_session(|s| {
        let customers: Vec<_> = (0..5).map(|i| Customer::sample(&format!("c{i}"))).collect();
        let outcomes = s.save_all(&customers).unwrap();
        assert_eq!(outcomes.len(), 5);
        assert_eq!(s.client.record_count(), 5);
        assert!(s.save_all(&customers).unwrap().iter().all(|o| o.is_skipped()));
    });
}

#[test]
fn save_all_resolves_before_writing() {
    let s = TestSession::with_config(MapperConfig::new());
    let customers = vec![Customer::sample("a"), Customer::sample("b")];
    assert!(s.save_all(&customers).is_err());
    assert_eq!(s.client.record_count(), 0);
}

#[test]
fn large_collections_through_session() {
    with_session(|s| {
        let customer = Customer::sample("c1");
        s.save(&customer).unwrap();

        let history = s
            .new_large_list::<_, i64>(&customer, "history", recbind_codec::TypeDescriptor::I64)
            .unwrap();
        history.add_all(0..10).unwrap();

        let reopened = s
            .large_list::<_, i64>(&customer, "history", recbind_codec::TypeDescriptor::I64)
            .unwrap();
        assert_eq!(reopened.size().unwrap(), 10);
        assert_eq!(reopened.range(2, 4).unwrap(), vec![2, 3, 4]);

        let prefs = s
            .large_map::<_, String, bool>(
                &customer,
                "prefs",
                (recbind_codec::TypeDescriptor::Text, recbind_codec::TypeDescriptor::Bool),
            )
            .unwrap();
        prefs.put("dark_mode".into(), true).unwrap();
        assert_eq!(prefs.get("dark_mode".into()).unwrap(), Some(true));
    });
}
