//! Process-wide host context shared by the orchestrator and every unit.

use crate::config::CoreConfig;
use crate::events::CoreEvent;
use crate::host::HostApi;
use crate::presentation::Presentation;
use crate::ready::ReadySignal;
use crate::sandbox::SandboxFactory;
use crate::themes::ThemeRegistry;
use plughost_types::UserPreferences;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Collaborators and shared mutable state of one plugin runtime.
///
/// Constructed once at startup and handed to every component. Tests call
/// [`HostContext::teardown`] to return it to a clean slate.
pub struct HostContext {
    config: CoreConfig,
    host: Arc<dyn HostApi>,
    sandboxes: Arc<dyn SandboxFactory>,
    presentation: Arc<dyn Presentation>,
    events: broadcast::Sender<CoreEvent>,
    preferences: Mutex<UserPreferences>,
    pub(crate) themes: Mutex<ThemeRegistry>,
    mounted: ReadySignal,
}

impl HostContext {
    pub fn new(
        config: CoreConfig,
        host: Arc<dyn HostApi>,
        sandboxes: Arc<dyn SandboxFactory>,
        presentation: Arc<dyn Presentation>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Arc::new(Self {
            config,
            host,
            sandboxes,
            presentation,
            events,
            preferences: Mutex::new(UserPreferences::default()),
            themes: Mutex::new(ThemeRegistry::default()),
            mounted: ReadySignal::new(),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<dyn HostApi> {
        &self.host
    }

    pub fn sandboxes(&self) -> &Arc<dyn SandboxFactory> {
        &self.sandboxes
    }

    pub fn presentation(&self) -> &Arc<dyn Presentation> {
        &self.presentation
    }

    // ================================================================
    // Events
    // ================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: CoreEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<CoreEvent> {
        self.events.clone()
    }

    // ================================================================
    // User preferences
    // ================================================================

    pub fn preferences(&self) -> UserPreferences {
        self.prefs().clone()
    }

    pub fn update_preferences<R>(&self, f: impl FnOnce(&mut UserPreferences) -> R) -> R {
        f(&mut self.prefs())
    }

    /// Reloads preferences from the host. On failure the in-memory copy is
    /// kept.
    pub async fn load_preferences(&self) -> UserPreferences {
        match self.host.load_user_preferences().await {
            Ok(loaded) => {
                let loaded = loaded.unwrap_or_default();
                *self.prefs() = loaded.clone();
                loaded
            }
            Err(e) => {
                warn!("Failed to load user preferences: {e:#}");
                self.preferences()
            }
        }
    }

    /// Persists the current preferences. Failures are logged.
    pub async fn save_preferences(&self) {
        let snapshot = self.preferences();
        match self.host.save_user_preferences(&snapshot).await {
            Ok(()) => debug!("user preferences saved"),
            Err(e) => warn!("Failed to save user preferences: {e:#}"),
        }
    }

    fn prefs(&self) -> MutexGuard<'_, UserPreferences> {
        self.preferences.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ================================================================
    // Host-mounted barrier
    // ================================================================

    /// Marks the host UI as mounted, releasing deferred fragment mounts.
    pub fn mark_host_mounted(&self) {
        self.mounted.resolve();
    }

    pub fn is_host_mounted(&self) -> bool {
        self.mounted.is_resolved()
    }

    pub(crate) fn mounted_signal(&self) -> ReadySignal {
        self.mounted.clone()
    }

    /// Clears preferences, theme state and the mounted barrier.
    pub async fn teardown(&self) {
        self.clear_themes().await;
        *self.prefs() = UserPreferences::default();
        self.mounted.reset();
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("config", &self.config)
            .field("mounted", &self.is_host_mounted())
            .finish_non_exhaustive()
    }
}
