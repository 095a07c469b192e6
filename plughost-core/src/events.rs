//! Lifecycle events published by the orchestrator and by individual units.

use crate::error::{PluginError, PluginErrorKind};
use chrono::{DateTime, Utc};
use plughost_settings::Settings;
use plughost_types::{PluginId, ThemeDescriptor, ThemeSelections};
use std::time::Duration;

/// Load timing of one unit within a registration batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTiming {
    pub origin: String,
    pub plugin_id: PluginId,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// A unit that failed to load during registration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    pub plugin_id: PluginId,
    pub origin: String,
    pub kind: PluginErrorKind,
    pub message: String,
}

impl LoadFailure {
    pub fn new(plugin_id: PluginId, origin: impl Into<String>, error: &PluginError) -> Self {
        Self {
            plugin_id,
            origin: origin.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Event on the process-wide bus.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    Registered(PluginId),
    Unregistered(PluginId),
    Error(LoadFailure),
    /// Registration batch finished.
    Ready(Vec<LoadTiming>),
    BeforeEnable(PluginId),
    Enabled(PluginId),
    BeforeDisable(PluginId),
    Disabled(PluginId),
    BeforeReload(PluginId),
    Reloaded(PluginId),
    SettingsChanged {
        plugin_id: PluginId,
        new: Settings,
        old: Settings,
    },
    /// Theme contributions of `plugin_id` changed.
    ThemesChanged {
        plugin_id: PluginId,
    },
    ThemeSelected(ThemeDescriptor),
    /// The active custom theme went away; carries the remaining selections.
    ResetCustomTheme(ThemeSelections),
    /// A managed install was unregistered and should be removed from disk.
    UnlinkPlugin(PluginId),
}

/// Event scoped to one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitEvent {
    Loaded,
    BeforeUnload { unregister: bool },
    Unloaded { unregister: bool },
    Error(String),
    MainUiVisible(bool),
}
