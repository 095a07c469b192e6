//! Property-based tests for the settings store.
//!
//! These check the notification and reserved-key guarantees over arbitrary
//! sequences of writes rather than hand-picked cases.

use plughost_settings::{Settings, SettingsEvent, SettingsStore};
use plughost_types::{SettingKind, SettingSchemaItem};
use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,6}".prop_map(Value::String),
    ]
}

fn key() -> impl Strategy<Value = String> {
    prop_oneof![Just("a".to_string()), Just("b".to_string()), Just("c".to_string())]
}

fn counting(store: &SettingsStore) -> Arc<Mutex<Vec<SettingsEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    store.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
    events
}

mod set_properties {
    use super::*;

    proptest! {
        #[test]
        fn change_fires_iff_value_differs(writes in prop::collection::vec((key(), scalar()), 1..40)) {
            let store = SettingsStore::default();
            let events = counting(&store);
            let mut expected = 0;
            for (k, v) in writes {
                let before = store.get(&k);
                let changed = store.set(&k, v.clone());
                prop_assert_eq!(changed, before.as_ref() != Some(&v));
                if changed {
                    expected += 1;
                }
                prop_assert_eq!(store.get(&k), Some(v));
            }
            prop_assert_eq!(events.lock().unwrap().len(), expected);
        }

        #[test]
        fn merge_never_drops_keys(
            base in prop::collection::btree_map(key(), scalar(), 0..3),
            patch in prop::collection::btree_map(key(), scalar(), 0..3),
        ) {
            let store = SettingsStore::new(base.clone().into_iter().collect::<Settings>());
            store.merge(patch.clone().into_iter().collect());
            let snap = store.snapshot();
            for k in base.keys().chain(patch.keys()) {
                prop_assert!(snap.contains_key(k));
            }
            for (k, v) in &patch {
                prop_assert_eq!(&snap[k], v);
            }
            prop_assert!(snap.contains_key("disabled"));
        }
    }
}

mod reset_properties {
    use super::*;

    proptest! {
        #[test]
        fn reset_leaves_disabled_boolean(
            disabled in scalar(),
            writes in prop::collection::vec((key(), scalar()), 0..10),
        ) {
            let store = SettingsStore::default();
            store
                .set_schema(vec![SettingSchemaItem::new("a", SettingKind::Number, json!(1))], false)
                .unwrap();
            for (k, v) in writes {
                store.set(&k, v);
            }
            store.set("disabled", disabled);
            store.reset();
            prop_assert!(store.get("disabled").is_some_and(|v| v.is_boolean()));
            prop_assert_eq!(store.get("a"), Some(json!(1)));
        }
    }
}
