use plughost_settings::*;
use plughost_types::{EnumPicker, SettingKind, SettingSchemaItem};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

fn settings(v: Value) -> Settings {
    v.as_object().cloned().unwrap()
}

fn recorder(store: &SettingsStore) -> Arc<Mutex<Vec<SettingsEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    store.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
    events
}

fn sample_schema() -> Vec<SettingSchemaItem> {
    vec![
        SettingSchemaItem::heading("general", "General"),
        SettingSchemaItem::new("fontSize", SettingKind::Number, json!(14)),
        SettingSchemaItem::new("theme", SettingKind::Enum, json!("auto"))
            .with_choices(["auto", "light", "dark"], EnumPicker::Radio),
        SettingSchemaItem::new("compact", SettingKind::Boolean, json!(false)),
    ]
}

// ============================================================================
// set / merge
// ============================================================================

#[test]
fn set_emits_only_on_change() {
    let store = SettingsStore::default();
    let events = recorder(&store);

    assert!(store.set("a", json!(1)));
    assert!(!store.set("a", json!(1)));
    assert!(store.set("a", json!(2)));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    match &events[1] {
        SettingsEvent::Changed { new, old } => {
            assert_eq!(old["a"], json!(1));
            assert_eq!(new["a"], json!(2));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn set_uses_deep_equality() {
    let store = SettingsStore::default();
    store.set("obj", json!({ "x": [1, 2] }));
    let events = recorder(&store);
    assert!(!store.set("obj", json!({ "x": [1, 2] })));
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn merge_keeps_absent_keys() {
    let store = SettingsStore::new(settings(json!({ "a": 1, "nested": { "x": 1, "y": 2 } })));
    let events = recorder(&store);

    assert!(store.merge(settings(json!({ "b": 2, "nested": { "y": 3 } }))));

    let snap = store.snapshot();
    assert_eq!(snap["a"], json!(1));
    assert_eq!(snap["b"], json!(2));
    assert_eq!(snap["nested"], json!({ "x": 1, "y": 3 }));
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn merge_without_change_is_silent() {
    let store = SettingsStore::new(settings(json!({ "a": 1 })));
    let events = recorder(&store);
    assert!(!store.merge(settings(json!({ "a": 1 }))));
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn disabled_stays_boolean_through_set_and_merge() {
    let store = SettingsStore::default();
    let events = recorder(&store);

    assert!(!store.set("disabled", json!("yes")));
    assert!(!store.set("disabled", Value::Null));
    assert_eq!(store.get("disabled"), Some(json!(false)));
    assert!(events.lock().unwrap().is_empty());

    assert!(store.set("disabled", json!("true")));
    assert_eq!(store.get("disabled"), Some(json!(true)));

    assert!(store.merge(settings(json!({ "disabled": 0, "a": 1 }))));
    assert_eq!(store.get("disabled"), Some(json!(false)));
    assert_eq!(store.get("a"), Some(json!(1)));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].disabled_transition(), Some(true));
    assert_eq!(events[1].new_settings()["disabled"], json!(false));
}

// ============================================================================
// schema
// ============================================================================

#[test]
fn set_schema_reconciles_and_notifies() {
    let store = SettingsStore::new(settings(json!({ "fontSize": "18", "theme": "neon" })));
    let events = recorder(&store);

    store.set_schema(sample_schema(), true).unwrap();

    let snap = store.snapshot();
    assert_eq!(snap["fontSize"], json!(18));
    assert_eq!(snap["theme"], json!("auto"));
    assert_eq!(snap["compact"], json!(false));
    assert!(!snap.contains_key("general"));
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn set_schema_without_reconcile_keeps_values() {
    let store = SettingsStore::new(settings(json!({ "fontSize": "18" })));
    store.set_schema(sample_schema(), false).unwrap();
    assert_eq!(store.get("fontSize"), Some(json!("18")));
    assert_eq!(store.schema().unwrap().len(), 4);
}

#[test]
fn set_schema_rejects_disabled_key() {
    let store = SettingsStore::default();
    let schema = vec![SettingSchemaItem::new("disabled", SettingKind::Boolean, json!(true))];
    assert_eq!(
        store.set_schema(schema, true),
        Err(SettingsError::ReservedKey("disabled".into()))
    );
    assert!(store.schema().is_none());
    assert!(!store.disabled());
}

// ============================================================================
// reset / restore
// ============================================================================

#[test]
fn reset_restores_defaults_and_keeps_disabled() {
    let store = SettingsStore::new(settings(json!({ "fontSize": 20, "extra": 1, "disabled": true })));
    store.set_schema(sample_schema(), false).unwrap();
    let events = recorder(&store);

    store.reset();

    assert_eq!(
        Value::Object(store.snapshot()),
        json!({ "fontSize": 14, "theme": "auto", "compact": false, "disabled": true })
    );
    let events = events.lock().unwrap();
    assert!(matches!(events[0], SettingsEvent::Reset { .. }));
}

#[test]
fn reset_without_schema_leaves_only_disabled() {
    let store = SettingsStore::new(settings(json!({ "a": 1 })));
    store.reset();
    assert_eq!(Value::Object(store.snapshot()), json!({ "disabled": false }));
}

#[test]
fn restore_is_silent() {
    let store = SettingsStore::new(settings(json!({ "a": 1 })));
    let events = recorder(&store);
    store.restore(settings(json!({ "a": 2 })));
    assert_eq!(store.get("a"), Some(json!(2)));
    assert_eq!(store.get("disabled"), Some(json!(false)));
    assert!(events.lock().unwrap().is_empty());
}

// ============================================================================
// subscriptions
// ============================================================================

#[test]
fn unsubscribe_stops_delivery() {
    let store = SettingsStore::default();
    let events = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&events);
    let id = store.subscribe(move |_| *sink.lock().unwrap() += 1);

    store.set("a", json!(1));
    assert!(store.unsubscribe(id));
    assert!(!store.unsubscribe(id));
    store.set("a", json!(2));

    assert_eq!(*events.lock().unwrap(), 1);
    assert_eq!(store.listener_count(), 0);
}

#[test]
fn listener_may_read_store() {
    let store = Arc::new(SettingsStore::default());
    let seen = Arc::new(Mutex::new(None));
    let (reader, sink) = (Arc::clone(&store), Arc::clone(&seen));
    store.subscribe(move |_| *sink.lock().unwrap() = reader.get("a"));

    store.set("a", json!("x"));
    assert_eq!(*seen.lock().unwrap(), Some(json!("x")));
}

#[test]
fn disabled_toggle_is_observable() {
    let store = SettingsStore::default();
    let events = recorder(&store);
    store.set("disabled", json!(true));
    store.set("other", json!(1));

    let events = events.lock().unwrap();
    assert_eq!(events[0].disabled_transition(), Some(true));
    assert_eq!(events[1].disabled_transition(), None);
}
