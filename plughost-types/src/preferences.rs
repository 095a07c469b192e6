//! Process-wide user preferences persisted through the host.

use crate::{PluginId, ThemeDescriptor, ThemeMode};
use serde::{Deserialize, Serialize};

/// Per-mode theme selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeSelections {
    #[serde(default)]
    pub mode: ThemeMode,
    #[serde(default)]
    pub light: Option<ThemeDescriptor>,
    #[serde(default)]
    pub dark: Option<ThemeDescriptor>,
}

impl ThemeSelections {
    pub fn get(&self, mode: ThemeMode) -> Option<&ThemeDescriptor> {
        match mode {
            ThemeMode::Light => self.light.as_ref(),
            ThemeMode::Dark => self.dark.as_ref(),
        }
    }

    pub fn set(&mut self, mode: ThemeMode, theme: Option<ThemeDescriptor>) {
        match mode {
            ThemeMode::Light => self.light = theme,
            ThemeMode::Dark => self.dark = theme,
        }
    }

    /// Theme selected for the current mode.
    pub fn current(&self) -> Option<&ThemeDescriptor> {
        self.get(self.mode)
    }
}

/// Preferences shared by every plugin in a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Single theme selection kept for hosts without light/dark modes.
    #[serde(default)]
    pub theme: Option<ThemeDescriptor>,
    #[serde(default)]
    pub themes: ThemeSelections,
    /// Origins of plugins registered from outside the managed root.
    #[serde(default)]
    pub externals: Vec<String>,
}

impl UserPreferences {
    /// Theme to apply on startup: the current mode's selection, else the
    /// legacy single selection.
    pub fn preferred_theme(&self) -> Option<&ThemeDescriptor> {
        self.themes.current().or(self.theme.as_ref())
    }

    /// Clears every theme field pointing at `pid`. Returns true when
    /// something was cleared.
    pub fn clear_themes_owned_by(&mut self, pid: &PluginId) -> bool {
        let mut cleared = false;
        for slot in [&mut self.theme, &mut self.themes.light, &mut self.themes.dark] {
            if slot.as_ref().is_some_and(|t| t.is_owned_by(pid)) {
                *slot = None;
                cleared = true;
            }
        }
        cleared
    }

    pub fn remove_externals(&mut self, origins: &[String]) {
        self.externals.retain(|o| !origins.contains(o));
    }
}
