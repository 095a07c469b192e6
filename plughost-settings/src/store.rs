//! Observable key/value store backing one plugin's settings.

use crate::reconcile::{defaults_from_schema, reconcile, validate_schema};
use crate::SettingsError;
use plughost_types::{DISABLED_KEY, SettingSchemaItem};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Flat settings map.
pub type Settings = Map<String, Value>;

/// Notification delivered to subscribers after an effective mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsEvent {
    Changed { new: Settings, old: Settings },
    Reset { new: Settings, old: Settings },
}

impl SettingsEvent {
    pub fn new_settings(&self) -> &Settings {
        match self {
            Self::Changed { new, .. } | Self::Reset { new, .. } => new,
        }
    }

    pub fn old_settings(&self) -> &Settings {
        match self {
            Self::Changed { old, .. } | Self::Reset { old, .. } => old,
        }
    }

    /// New value of `disabled` when this event flipped it.
    pub fn disabled_transition(&self) -> Option<bool> {
        let before = disabled_of(self.old_settings());
        let after = disabled_of(self.new_settings());
        (before != after).then_some(after)
    }
}

/// Handle returned by [`SettingsStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&SettingsEvent) + Send + Sync>;

struct Inner {
    values: Settings,
    schema: Option<Vec<SettingSchemaItem>>,
}

/// Per-plugin settings with change notification.
///
/// The reserved `disabled` key is present from construction on. Listeners
/// are invoked after the internal lock is released, so a listener may read
/// the store again.
pub struct SettingsStore {
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
}

impl SettingsStore {
    pub fn new(initial: Settings) -> Self {
        Self {
            inner: Mutex::new(Inner {
                values: with_disabled(initial),
                schema: None,
            }),
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        lock(&self.inner).values.get(key).cloned()
    }

    pub fn disabled(&self) -> bool {
        disabled_of(&lock(&self.inner).values)
    }

    pub fn snapshot(&self) -> Settings {
        lock(&self.inner).values.clone()
    }

    pub fn schema(&self) -> Option<Vec<SettingSchemaItem>> {
        lock(&self.inner).schema.clone()
    }

    /// Replaces one key. Returns true and notifies when the value changed.
    ///
    /// `disabled` is coerced to a boolean like on construction.
    pub fn set(&self, key: &str, value: Value) -> bool {
        let event = {
            let mut inner = lock(&self.inner);
            if inner.values.get(key) == Some(&value) {
                return false;
            }
            let old = inner.values.clone();
            let mut next = old.clone();
            next.insert(key.to_string(), value);
            let next = with_disabled(next);
            if next == old {
                return false;
            }
            inner.values = next.clone();
            SettingsEvent::Changed { new: next, old }
        };
        debug!(key, "settings key updated");
        self.emit(&event);
        true
    }

    /// Deep-merges `partial` into the store. Nested objects merge, other
    /// values replace. Returns true and notifies when anything changed.
    pub fn merge(&self, partial: Settings) -> bool {
        let event = {
            let mut inner = lock(&self.inner);
            let old = inner.values.clone();
            let mut next = old.clone();
            deep_merge(&mut next, partial);
            let next = with_disabled(next);
            if next == old {
                return false;
            }
            inner.values = next.clone();
            SettingsEvent::Changed { new: next, old }
        };
        self.emit(&event);
        true
    }

    /// Attaches a schema. With `reconcile`, stored values are brought in line
    /// with it and subscribers are notified if that changed anything.
    pub fn set_schema(
        &self,
        schema: Vec<SettingSchemaItem>,
        reconcile_values: bool,
    ) -> Result<(), SettingsError> {
        validate_schema(&schema)?;
        let event = {
            let mut inner = lock(&self.inner);
            let event = if reconcile_values {
                let old = inner.values.clone();
                let next = reconcile(&old, &schema);
                (next != old).then(|| {
                    inner.values = next.clone();
                    SettingsEvent::Changed { new: next, old }
                })
            } else {
                None
            };
            inner.schema = Some(schema);
            event
        };
        if let Some(event) = event {
            self.emit(&event);
        }
        Ok(())
    }

    /// Replaces the values with the schema defaults, keeping `disabled`.
    pub fn reset(&self) {
        let event = {
            let mut inner = lock(&self.inner);
            let old = inner.values.clone();
            let mut next = inner
                .schema
                .as_deref()
                .map(defaults_from_schema)
                .unwrap_or_default();
            next.insert(DISABLED_KEY.to_string(), Value::Bool(disabled_of(&old)));
            inner.values = next.clone();
            SettingsEvent::Reset { new: next, old }
        };
        self.emit(&event);
    }

    /// Replaces the values without notifying anyone.
    pub fn restore(&self, values: Settings) {
        lock(&self.inner).values = with_disabled(values);
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SettingsEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn emit(&self, event: &SettingsEvent) {
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Settings::new())
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("values", &lock(&self.inner).values)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn disabled_of(values: &Settings) -> bool {
    values
        .get(DISABLED_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn with_disabled(mut values: Settings) -> Settings {
    let disabled = match values.get(DISABLED_KEY) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    values.insert(DISABLED_KEY.to_string(), Value::Bool(disabled));
    values
}

fn deep_merge(target: &mut Settings, partial: Settings) {
    for (key, value) in partial {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn disabled_is_normalized_on_construction() {
        let store = SettingsStore::new(Map::new());
        assert_eq!(store.get(DISABLED_KEY), Some(json!(false)));

        let store = SettingsStore::new(json!({ "disabled": "true" }).as_object().cloned().unwrap());
        assert!(store.disabled());
    }

    #[test]
    fn deep_merge_keeps_siblings() {
        let mut target = json!({ "a": { "x": 1, "y": 2 }, "b": 1 })
            .as_object()
            .cloned()
            .unwrap();
        let partial = json!({ "a": { "y": 3 } }).as_object().cloned().unwrap();
        deep_merge(&mut target, partial);
        assert_eq!(Value::Object(target), json!({ "a": { "x": 1, "y": 3 }, "b": 1 }));
    }

    #[test]
    fn disabled_transition_detects_flip() {
        let off = json!({ "disabled": false }).as_object().cloned().unwrap();
        let on = json!({ "disabled": true }).as_object().cloned().unwrap();
        let event = SettingsEvent::Changed {
            new: on.clone(),
            old: off,
        };
        assert_eq!(event.disabled_transition(), Some(true));
        let same = SettingsEvent::Changed {
            new: on.clone(),
            old: on,
        };
        assert_eq!(same.disabled_transition(), None);
    }
}
