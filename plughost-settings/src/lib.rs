//! Per-plugin settings for plughost.
//!
//! A [`SettingsStore`] holds one plugin's flat key/value configuration and an
//! optional declared schema. Every effective mutation is broadcast to
//! subscribers as a [`SettingsEvent`] carrying full before/after snapshots,
//! which is how the lifecycle engine persists settings and reacts to the
//! reserved `disabled` key. The store itself never touches storage.

mod error;
mod reconcile;
mod store;

pub use error::SettingsError;
pub use reconcile::{defaults_from_schema, reconcile, validate_schema};
pub use store::{Settings, SettingsEvent, SettingsStore, SubscriptionId};

/// Settings key holding a development entry override.
pub const DEV_ENTRY_KEY: &str = "_devEntry";
