use plughost_types::{LifecycleStatus, PluginId};
use std::collections::{HashMap, HashSet};

// ── PluginId ──────────────────────────────────────────────────────

#[test]
fn minted_ids_are_unique() {
    let a = PluginId::mint();
    let b = PluginId::mint();
    assert_ne!(a, b);
    assert!(a.is_minted());
}

#[test]
fn explicit_id_is_not_minted() {
    assert!(!PluginId::new("logseq-journals").is_minted());
}

#[test]
fn display_matches_inner_string() {
    let id = PluginId::new("calendar");
    assert_eq!(id.to_string(), "calendar");
    assert_eq!(id.as_str(), "calendar");
}

#[test]
fn serializes_transparently() {
    let id = PluginId::new("calendar");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"calendar\"");
    let parsed: PluginId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn hashmap_lookup_by_str() {
    let mut map = HashMap::new();
    map.insert(PluginId::new("a"), 1);
    assert_eq!(map.get("a"), Some(&1));
}

#[test]
fn hash_and_eq() {
    let mut set = HashSet::new();
    set.insert(PluginId::new("x"));
    set.insert(PluginId::from("x"));
    assert_eq!(set.len(), 1);
}

// ── LifecycleStatus ───────────────────────────────────────────────

#[test]
fn pending_statuses() {
    assert!(LifecycleStatus::Loading.is_pending());
    assert!(LifecycleStatus::Unloading.is_pending());
    assert!(!LifecycleStatus::Loaded.is_pending());
    assert!(!LifecycleStatus::Unloaded.is_pending());
    assert!(!LifecycleStatus::Error.is_pending());
}

#[test]
fn status_serializes_lowercase() {
    let json = serde_json::to_string(&LifecycleStatus::Unloading).unwrap();
    assert_eq!(json, "\"unloading\"");
    assert_eq!(LifecycleStatus::default(), LifecycleStatus::Unloaded);
    assert_eq!(LifecycleStatus::Error.to_string(), "error");
}
