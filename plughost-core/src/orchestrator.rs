//! Registry and orchestrator for the whole plugin population.
//!
//! Registers batches of plugins, keeps them in registration order, routes
//! application hooks to them and fronts the shared theme state.

use crate::context::HostContext;
use crate::error::{PluginError, PluginResult};
use crate::events::{CoreEvent, LoadFailure, LoadTiming};
use crate::hooks::{HOOK_APP, HOOK_DB, HOOK_EDITOR, HookCapability, hook_name, snake_case};
use crate::ready::ReadySignal;
use crate::sandbox::OutboundMessage;
use crate::themes::SelectThemeOptions;
use crate::unit::{LoadOptions, PluginUnit, UnitCommand};
use chrono::Utc;
use plughost_settings::SubscriptionId;
use plughost_types::{DISABLED_KEY, PluginId, PluginOptions, ThemeDescriptor, ThemeMode};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Default)]
struct Registry {
    order: Vec<PluginId>,
    units: HashMap<PluginId, Arc<PluginUnit>>,
    watchers: HashMap<PluginId, SubscriptionId>,
}

/// Manages every registered plugin unit.
pub struct Orchestrator {
    ctx: Arc<HostContext>,
    registry: RwLock<Registry>,
    registering: AtomicBool,
}

impl Orchestrator {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self {
            ctx,
            registry: RwLock::new(Registry::default()),
            registering: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &Arc<HostContext> {
        &self.ctx
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.ctx.subscribe()
    }

    // ================================================================
    // Registration
    // ================================================================

    /// Registers a batch of plugins.
    ///
    /// Units load one after another; a failing unit never aborts the batch.
    /// Package and identity failures keep the unit out of the registry, other
    /// failures register it in the `error` state. [`CoreEvent::Ready`] is
    /// always published at the end.
    pub async fn register<I>(&self, plugins: I, initial: bool)
    where
        I: IntoIterator<Item = PluginOptions>,
    {
        self.registering.store(true, Ordering::SeqCst);
        let preferences = self.ctx.load_preferences().await;
        let externals = self.validate_externals(preferences.externals).await;

        let mut plugins: Vec<PluginOptions> = plugins.into_iter().collect();
        if initial {
            for origin in &externals {
                if !plugins.iter().any(|p| &p.url == origin) {
                    plugins.push(PluginOptions::from_origin(origin.clone()));
                }
            }
        }
        info!(count = plugins.len(), initial, "Registering plugins");

        let ready = ReadySignal::new();
        let mut timings = Vec::with_capacity(plugins.len());
        let mut registered_externals = Vec::new();

        for options in plugins {
            let origin = options.url.clone();
            let unit = Arc::new(PluginUnit::new(Arc::clone(&self.ctx), options));
            let started_at = Utc::now();
            let started = Instant::now();
            unit.load(LoadOptions {
                reload: false,
                ready: Some(ready.clone()),
                taken: self.plugin_ids().into_iter().collect::<HashSet<_>>(),
            })
            .await;
            let plugin_id = unit.id();
            timings.push(LoadTiming {
                origin: origin.clone(),
                plugin_id: plugin_id.clone(),
                started_at,
                elapsed: started.elapsed(),
            });

            if let Some(err) = unit.load_error() {
                self.ctx
                    .emit(CoreEvent::Error(LoadFailure::new(plugin_id.clone(), &origin, &err)));
                if err.is_fatal_for_registration() {
                    warn!(plugin_id = %plugin_id, origin = %origin, "Skipping plugin: {err}");
                    continue;
                }
            }

            self.insert(Arc::clone(&unit));
            self.ctx.emit(CoreEvent::Registered(plugin_id));
            if !unit.is_managed() {
                registered_externals.push(origin);
            }
        }

        self.ctx.update_preferences(|prefs| {
            let mut merged = externals;
            for origin in registered_externals {
                if !merged.contains(&origin) {
                    merged.push(origin);
                }
            }
            prefs.externals = merged;
        });
        self.ctx.save_preferences().await;

        if let Err(e) = self.ctx.activate_user_preferences().await {
            warn!("Failed to activate preferred theme: {e}");
        }

        ready.resolve();
        self.registering.store(false, Ordering::SeqCst);
        info!(registered = self.plugin_count(), "Plugin registration finished");
        self.ctx.emit(CoreEvent::Ready(timings));
    }

    async fn validate_externals(&self, externals: Vec<String>) -> Vec<String> {
        if externals.is_empty() {
            return externals;
        }
        match self.ctx.host().validate_external_plugins(&externals).await {
            Ok(validity) => externals
                .into_iter()
                .filter(|origin| {
                    let valid = validity.get(origin).copied().unwrap_or(false);
                    if !valid {
                        info!(origin = %origin, "Dropping invalid external plugin");
                    }
                    valid
                })
                .collect(),
            Err(e) => {
                warn!("Failed to validate external plugins: {e:#}");
                externals
            }
        }
    }

    fn insert(&self, unit: Arc<PluginUnit>) {
        let id = unit.id();
        let watcher = unit.settings().map(|store| {
            let events = self.ctx.event_sender();
            let commands = unit.command_sender();
            let plugin_id = id.clone();
            store.subscribe(move |event| {
                let _ = events.send(CoreEvent::SettingsChanged {
                    plugin_id: plugin_id.clone(),
                    new: event.new_settings().clone(),
                    old: event.old_settings().clone(),
                });
                let _ = commands.send(UnitCommand::ForwardSettings(event.new_settings().clone()));
            })
        });

        let mut registry = self.write();
        if !registry.units.contains_key(&id) {
            registry.order.push(id.clone());
        }
        if let Some(watcher) = watcher {
            registry.watchers.insert(id.clone(), watcher);
        }
        registry.units.insert(id, unit);
    }

    fn remove(&self, id: &str) -> Option<Arc<PluginUnit>> {
        let (unit, watcher) = {
            let mut registry = self.write();
            registry.order.retain(|pid| pid != id);
            (registry.units.remove(id), registry.watchers.remove(id))
        };
        if let (Some(unit), Some(watcher)) = (&unit, watcher) {
            if let Some(store) = unit.settings() {
                store.unsubscribe(watcher);
            }
        }
        unit
    }

    /// Reloads each plugin in turn. Stops at the first unknown id.
    pub async fn reload<I, S>(&self, ids: I) -> PluginResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let unit = self.ensure_plugin(id.as_ref())?;
            let plugin_id = unit.id();
            self.ctx.emit(CoreEvent::BeforeReload(plugin_id.clone()));
            unit.reload().await;
            self.ctx.emit(CoreEvent::Reloaded(plugin_id));
        }
        Ok(())
    }

    /// Unloads and removes plugins. Stops at the first unknown id.
    pub async fn unregister<I, S>(&self, ids: I) -> PluginResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dropped_externals = Vec::new();
        let mut result = Ok(());

        for id in ids {
            let id = id.as_ref();
            let Some(unit) = self.plugin(id) else {
                result = Err(PluginError::NotFound(id.to_string()));
                break;
            };
            unit.unload(true).await;
            self.remove(id);
            let plugin_id = unit.id();
            info!(plugin_id = %plugin_id, "Plugin unregistered");
            self.ctx.emit(CoreEvent::Unregistered(plugin_id));
            if !unit.is_managed() {
                dropped_externals.push(unit.origin().to_string());
            }
        }

        if !dropped_externals.is_empty() {
            self.ctx
                .update_preferences(|prefs| prefs.remove_externals(&dropped_externals));
            self.ctx.save_preferences().await;
        }
        result
    }

    // ================================================================
    // Enable / disable
    // ================================================================

    pub async fn enable(&self, id: &str) -> PluginResult<()> {
        self.set_disabled(id, false).await
    }

    pub async fn disable(&self, id: &str) -> PluginResult<()> {
        self.set_disabled(id, true).await
    }

    async fn set_disabled(&self, id: &str, disabled: bool) -> PluginResult<()> {
        let unit = self.ensure_plugin(id)?;
        if unit.is_pending() {
            debug!(plugin_id = id, "toggle ignored while pending");
            return Ok(());
        }
        let plugin_id = unit.id();
        self.ctx.emit(if disabled {
            CoreEvent::BeforeDisable(plugin_id.clone())
        } else {
            CoreEvent::BeforeEnable(plugin_id.clone())
        });
        unit.set_setting(DISABLED_KEY, Value::Bool(disabled)).await;
        info!(plugin_id = %plugin_id, disabled, "Plugin toggled");
        self.ctx.emit(if disabled {
            CoreEvent::Disabled(plugin_id)
        } else {
            CoreEvent::Enabled(plugin_id)
        });
        Ok(())
    }

    // ================================================================
    // Hooks
    // ================================================================

    /// Delivers a hook to one plugin (`target`) or to every eligible plugin
    /// in registration order. An inactive or unknown target gets the
    /// broadcast instead.
    pub async fn hook(&self, ns: &str, kind: &str, payload: Value, target: Option<&str>) {
        let name = hook_name(ns, kind);
        let message = OutboundMessage::Hook {
            name: name.clone(),
            ns: ns.to_string(),
            kind: snake_case(kind),
            payload,
        };

        if let Some(target) = target {
            match self.plugin(target) {
                Some(unit) if unit.is_enabled() && unit.has_entry() => {
                    deliver(&unit, message).await;
                    return;
                }
                Some(_) => debug!(plugin_id = target, hook = %name, "hook target inactive"),
                None => debug!(plugin_id = target, hook = %name, "hook target not registered"),
            }
        }

        for unit in self.plugins() {
            if !unit.is_enabled() || !unit.has_entry() {
                continue;
            }
            if self.accepts_hook(&unit, &name).await {
                deliver(&unit, message.clone()).await;
            }
        }
    }

    pub async fn hook_app(&self, kind: &str, payload: Value, target: Option<&str>) {
        self.hook(HOOK_APP, kind, payload, target).await;
    }

    pub async fn hook_editor(&self, kind: &str, payload: Value, target: Option<&str>) {
        self.hook(HOOK_EDITOR, kind, payload, target).await;
    }

    pub async fn hook_db(&self, kind: &str, payload: Value, target: Option<&str>) {
        self.hook(HOOK_DB, kind, payload, target).await;
    }

    async fn accepts_hook(&self, unit: &PluginUnit, name: &str) -> bool {
        match unit.hook_capability() {
            HookCapability::Legacy => !self.ctx.config().is_suppressed_legacy_hook(name),
            HookCapability::VersionAware => {
                let id = unit.id();
                match self.ctx.host().should_exec_plugin_hook(&id, name).await {
                    Ok(allowed) => allowed,
                    Err(e) => {
                        warn!(plugin_id = %id, hook = name, "Hook check failed: {e:#}");
                        false
                    }
                }
            }
        }
    }

    // ================================================================
    // Themes
    // ================================================================

    pub fn register_theme(&self, plugin_id: &PluginId, theme: ThemeDescriptor) {
        self.ctx.register_theme(plugin_id, theme);
    }

    pub async fn select_theme(
        &self,
        theme: ThemeDescriptor,
        options: SelectThemeOptions,
    ) -> PluginResult<()> {
        self.ctx.select_theme(theme, options).await
    }

    pub async fn unregister_theme(&self, plugin_id: &PluginId, effect: bool) {
        self.ctx.unregister_theme(plugin_id, effect).await;
    }

    pub async fn activate_user_preferences(&self) -> PluginResult<()> {
        self.ctx.activate_user_preferences().await
    }

    pub async fn set_theme_mode(&self, mode: ThemeMode) -> PluginResult<()> {
        self.ctx.set_theme_mode(mode).await
    }

    pub fn themes(&self) -> Vec<ThemeDescriptor> {
        self.ctx.themes()
    }

    /// Releases UI fragments deferred until the host is mounted.
    pub fn mark_host_mounted(&self) {
        self.ctx.mark_host_mounted();
    }

    // ================================================================
    // Queries
    // ================================================================

    pub fn plugin(&self, id: &str) -> Option<Arc<PluginUnit>> {
        self.read().units.get(id).cloned()
    }

    pub fn ensure_plugin(&self, id: &str) -> PluginResult<Arc<PluginUnit>> {
        self.plugin(id)
            .ok_or_else(|| PluginError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().units.contains_key(id)
    }

    /// Registered units in registration order.
    pub fn plugins(&self) -> Vec<Arc<PluginUnit>> {
        let registry = self.read();
        registry
            .order
            .iter()
            .filter_map(|id| registry.units.get(id).cloned())
            .collect()
    }

    pub fn plugin_ids(&self) -> Vec<PluginId> {
        self.read().order.clone()
    }

    pub fn enabled_plugins(&self) -> Vec<Arc<PluginUnit>> {
        self.plugins()
            .into_iter()
            .filter(|unit| unit.is_enabled())
            .collect()
    }

    pub fn plugin_count(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_registering(&self) -> bool {
        self.registering.load(Ordering::SeqCst)
    }

    /// Unloads every unit and resets the registry and the shared context.
    pub async fn teardown(&self) {
        for unit in self.plugins() {
            unit.unload(false).await;
        }
        let registry = std::mem::take(&mut *self.write());
        for (id, watcher) in registry.watchers {
            if let Some(store) = registry.units.get(&id).and_then(|u| u.settings()) {
                store.unsubscribe(watcher);
            }
        }
        self.ctx.teardown().await;
        self.registering.store(false, Ordering::SeqCst);
        debug!("orchestrator torn down");
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn deliver(unit: &PluginUnit, message: OutboundMessage) {
    if let Err(e) = unit.call_user_model(message).await {
        debug!(plugin_id = %unit.id(), "hook not delivered: {e}");
    }
}
