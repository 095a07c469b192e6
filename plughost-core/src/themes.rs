//! Theme contributions and the single active theme.

use crate::context::HostContext;
use crate::disposal::{Release, release};
use crate::error::{PluginError, PluginResult};
use crate::events::CoreEvent;
use plughost_types::{PluginId, ThemeDescriptor, ThemeMode};
use std::sync::{Arc, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Options for [`HostContext::select_theme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectThemeOptions {
    /// Persist the selection into user preferences.
    pub effect: bool,
    /// Publish [`CoreEvent::ThemeSelected`].
    pub emit: bool,
}

impl Default for SelectThemeOptions {
    fn default() -> Self {
        Self {
            effect: true,
            emit: true,
        }
    }
}

impl SelectThemeOptions {
    pub const QUIET: Self = Self {
        effect: false,
        emit: false,
    };
}

struct ActiveTheme {
    descriptor: ThemeDescriptor,
    revoke: Option<Release>,
}

/// Registered contributions, in registration order per plugin.
#[derive(Default)]
pub(crate) struct ThemeRegistry {
    contributions: Vec<(PluginId, Vec<ThemeDescriptor>)>,
    active: Option<ActiveTheme>,
}

impl HostContext {
    fn theme_registry(&self) -> MutexGuard<'_, ThemeRegistry> {
        self.themes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a theme contributed by `plugin_id`.
    pub fn register_theme(&self, plugin_id: &PluginId, theme: ThemeDescriptor) {
        let theme = theme.owned_by(plugin_id);
        {
            let mut registry = self.theme_registry();
            match registry
                .contributions
                .iter_mut()
                .find(|(pid, _)| pid == plugin_id)
            {
                Some((_, themes)) => themes.push(theme),
                None => registry.contributions.push((plugin_id.clone(), vec![theme])),
            }
        }
        debug!(plugin_id = %plugin_id, "theme registered");
        self.emit(CoreEvent::ThemesChanged {
            plugin_id: plugin_id.clone(),
        });
    }

    /// Every registered theme, each tagged with its owner.
    pub fn themes(&self) -> Vec<ThemeDescriptor> {
        self.theme_registry()
            .contributions
            .iter()
            .flat_map(|(_, themes)| themes.iter().cloned())
            .collect()
    }

    pub fn themes_of(&self, plugin_id: &PluginId) -> Vec<ThemeDescriptor> {
        self.theme_registry()
            .contributions
            .iter()
            .find(|(pid, _)| pid == plugin_id)
            .map(|(_, themes)| themes.clone())
            .unwrap_or_default()
    }

    pub fn active_theme(&self) -> Option<ThemeDescriptor> {
        self.theme_registry()
            .active
            .as_ref()
            .map(|a| a.descriptor.clone())
    }

    /// Makes `theme` the active theme. The previous theme is revoked first;
    /// a theme without a location leaves no theme active.
    pub async fn select_theme(
        &self,
        theme: ThemeDescriptor,
        options: SelectThemeOptions,
    ) -> PluginResult<()> {
        self.revoke_active().await;

        if let Some(url) = theme.location().map(str::to_string) {
            self.presentation()
                .inject_theme(&url)
                .await
                .map_err(|e| PluginError::host_call("inject_theme", e))?;
            let presentation = Arc::clone(self.presentation());
            let revoke = release(move || async move { presentation.eject_theme(&url).await });
            self.theme_registry().active = Some(ActiveTheme {
                descriptor: theme.clone(),
                revoke: Some(revoke),
            });
        }
        info!(theme = %theme.name, "theme selected");

        if options.effect {
            self.update_preferences(|prefs| match theme.mode {
                Some(mode) => prefs.themes.set(mode, Some(theme.clone())),
                None => prefs.theme = Some(theme.clone()),
            });
            self.save_preferences().await;
        }
        if options.emit {
            self.emit(CoreEvent::ThemeSelected(theme));
        }
        Ok(())
    }

    /// Drops every contribution of `plugin_id`. With `effect`, an active theme
    /// owned by it is revoked, its preference entries cleared and
    /// [`CoreEvent::ResetCustomTheme`] published.
    pub async fn unregister_theme(&self, plugin_id: &PluginId, effect: bool) {
        let owns_active = {
            let mut registry = self.theme_registry();
            registry.contributions.retain(|(pid, _)| pid != plugin_id);
            registry
                .active
                .as_ref()
                .is_some_and(|a| a.descriptor.is_owned_by(plugin_id))
        };
        self.emit(CoreEvent::ThemesChanged {
            plugin_id: plugin_id.clone(),
        });

        if !(effect && owns_active) {
            return;
        }
        self.revoke_active().await;
        self.update_preferences(|prefs| prefs.clear_themes_owned_by(plugin_id));
        self.save_preferences().await;
        info!(plugin_id = %plugin_id, "custom theme reset");
        let selections = self.preferences().themes;
        self.emit(CoreEvent::ResetCustomTheme(selections));
    }

    /// Re-applies the preferred theme from user preferences.
    pub async fn activate_user_preferences(&self) -> PluginResult<()> {
        let preferred = self.preferences().preferred_theme().cloned();
        match preferred {
            Some(theme) => self.select_theme(theme, SelectThemeOptions::QUIET).await,
            None => Ok(()),
        }
    }

    /// Switches light/dark mode, persists it and applies that mode's theme.
    pub async fn set_theme_mode(&self, mode: ThemeMode) -> PluginResult<()> {
        let theme = self.update_preferences(|prefs| {
            prefs.themes.mode = mode;
            prefs.themes.get(mode).cloned()
        });
        self.save_preferences().await;
        let theme = theme.unwrap_or_else(|| ThemeDescriptor::builtin(Some(mode)));
        self.select_theme(
            theme,
            SelectThemeOptions {
                effect: false,
                emit: true,
            },
        )
        .await
    }

    pub(crate) async fn clear_themes(&self) {
        self.revoke_active().await;
        self.theme_registry().contributions.clear();
    }

    async fn revoke_active(&self) {
        let previous = self.theme_registry().active.take();
        let Some(ActiveTheme { descriptor, revoke }) = previous else {
            return;
        };
        if let Some(revoke) = revoke {
            if let Err(e) = revoke().await {
                warn!(theme = %descriptor.name, "Failed to revoke theme: {e:#}");
            }
        }
    }
}
