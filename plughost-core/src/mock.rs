//! In-memory collaborators for tests.
//!
//! Each mock records the calls it receives and can be told to fail specific
//! operations.

use crate::host::HostApi;
use crate::presentation::{Presentation, StyleHandle};
use crate::requests::UiFragment;
use crate::sandbox::{OutboundMessage, SandboxChannel, SandboxFactory, SandboxSpec};
use anyhow::bail;
use async_trait::async_trait;
use plughost_settings::Settings;
use plughost_types::{PluginId, PluginOptions, UserPreferences};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Host
// ============================================================================

/// In-memory [`HostApi`].
#[derive(Debug, Default)]
pub struct MockHost {
    packages: Mutex<HashMap<String, String>>,
    saved_configs: Mutex<HashMap<String, Value>>,
    user_settings: Mutex<HashMap<PluginId, Settings>>,
    settings_saves: AtomicUsize,
    preferences: Mutex<Option<UserPreferences>>,
    preference_saves: AtomicUsize,
    invalid_externals: Mutex<HashSet<String>>,
    denied_hooks: Mutex<HashSet<(PluginId, String)>>,
    hook_checks: Mutex<Vec<(PluginId, String)>>,
    files: Mutex<HashMap<PathBuf, String>>,
    exports: Mutex<HashMap<String, Value>>,
    focused: Mutex<Vec<Option<PluginId>>>,
    cursor_restores: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    package_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `descriptor` as the `package.json` of `origin`.
    pub fn add_package(&self, origin: &str, descriptor: Value) {
        lock(&self.packages).insert(origin.to_string(), descriptor.to_string());
    }

    pub fn add_raw_package(&self, origin: &str, text: &str) {
        lock(&self.packages).insert(origin.to_string(), text.to_string());
    }

    pub fn set_user_settings(&self, plugin_id: &str, settings: Value) {
        let map = settings.as_object().cloned().unwrap_or_default();
        lock(&self.user_settings).insert(PluginId::new(plugin_id), map);
    }

    pub fn set_preferences(&self, preferences: UserPreferences) {
        *lock(&self.preferences) = Some(preferences);
    }

    pub fn reject_external(&self, origin: &str) {
        lock(&self.invalid_externals).insert(origin.to_string());
    }

    pub fn deny_hook(&self, plugin_id: &str, hook: &str) {
        lock(&self.denied_hooks).insert((PluginId::new(plugin_id), hook.to_string()));
    }

    pub fn add_export(&self, method: &str, result: Value) {
        lock(&self.exports).insert(method.to_string(), result);
    }

    /// Holds the next package read until the returned gate is notified.
    pub fn hold_next_package_read(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.package_gate) = Some(Arc::clone(&gate));
        gate
    }

    /// Makes the named host call fail from now on.
    pub fn fail(&self, call: &str) {
        lock(&self.failing).insert(call.to_string());
    }

    pub fn saved_config(&self, origin: &str) -> Option<Value> {
        lock(&self.saved_configs).get(origin).cloned()
    }

    pub fn user_settings(&self, plugin_id: &str) -> Option<Settings> {
        lock(&self.user_settings).get(plugin_id).cloned()
    }

    pub fn settings_saves(&self) -> usize {
        self.settings_saves.load(Ordering::SeqCst)
    }

    pub fn preferences(&self) -> Option<UserPreferences> {
        lock(&self.preferences).clone()
    }

    pub fn preference_saves(&self) -> usize {
        self.preference_saves.load(Ordering::SeqCst)
    }

    pub fn hook_checks(&self) -> Vec<(PluginId, String)> {
        lock(&self.hook_checks).clone()
    }

    pub fn files(&self) -> HashMap<PathBuf, String> {
        lock(&self.files).clone()
    }

    pub fn focused_history(&self) -> Vec<Option<PluginId>> {
        lock(&self.focused).clone()
    }

    pub fn cursor_restores(&self) -> usize {
        self.cursor_restores.load(Ordering::SeqCst)
    }

    fn check(&self, call: &str) -> anyhow::Result<()> {
        if lock(&self.failing).contains(call) {
            bail!("{call} failed");
        }
        Ok(())
    }
}

#[async_trait]
impl HostApi for MockHost {
    async fn load_plugin_config(&self, origin: &str) -> anyhow::Result<Option<String>> {
        self.check("load_plugin_config")?;
        let gate = lock(&self.package_gate).take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(lock(&self.packages).get(origin).cloned())
    }

    async fn save_plugin_config(&self, origin: &str, descriptor: &Value) -> anyhow::Result<()> {
        self.check("save_plugin_config")?;
        lock(&self.saved_configs).insert(origin.to_string(), descriptor.clone());
        lock(&self.packages).insert(origin.to_string(), descriptor.to_string());
        Ok(())
    }

    async fn load_plugin_user_settings(
        &self,
        plugin_id: &PluginId,
    ) -> anyhow::Result<(PathBuf, Settings)> {
        self.check("load_plugin_user_settings")?;
        let settings = lock(&self.user_settings)
            .get(plugin_id)
            .cloned()
            .unwrap_or_default();
        Ok((PathBuf::from(format!("/mock/settings/{plugin_id}.json")), settings))
    }

    async fn save_plugin_user_settings(
        &self,
        plugin_id: &PluginId,
        settings: &Settings,
    ) -> anyhow::Result<()> {
        self.check("save_plugin_user_settings")?;
        self.settings_saves.fetch_add(1, Ordering::SeqCst);
        lock(&self.user_settings).insert(plugin_id.clone(), settings.clone());
        Ok(())
    }

    async fn load_user_preferences(&self) -> anyhow::Result<Option<UserPreferences>> {
        self.check("load_user_preferences")?;
        Ok(self.preferences())
    }

    async fn save_user_preferences(&self, preferences: &UserPreferences) -> anyhow::Result<()> {
        self.check("save_user_preferences")?;
        self.preference_saves.fetch_add(1, Ordering::SeqCst);
        *lock(&self.preferences) = Some(preferences.clone());
        Ok(())
    }

    async fn validate_external_plugins(
        &self,
        origins: &[String],
    ) -> anyhow::Result<HashMap<String, bool>> {
        self.check("validate_external_plugins")?;
        let invalid = lock(&self.invalid_externals);
        Ok(origins
            .iter()
            .map(|o| (o.clone(), !invalid.contains(o)))
            .collect())
    }

    async fn should_exec_plugin_hook(
        &self,
        plugin_id: &PluginId,
        hook: &str,
    ) -> anyhow::Result<bool> {
        self.check("should_exec_plugin_hook")?;
        lock(&self.hook_checks).push((plugin_id.clone(), hook.to_string()));
        Ok(!lock(&self.denied_hooks).contains(&(plugin_id.clone(), hook.to_string())))
    }

    async fn write_user_tmp_file(&self, name: &str, content: &str) -> anyhow::Result<PathBuf> {
        self.check("write_user_tmp_file")?;
        let path = PathBuf::from("/mock/tmp").join(name);
        lock(&self.files).insert(path.clone(), content.to_string());
        Ok(path)
    }

    async fn write_dotdir_file(
        &self,
        name: &str,
        content: &str,
        subdir: Option<&str>,
    ) -> anyhow::Result<PathBuf> {
        self.check("write_dotdir_file")?;
        let mut path = PathBuf::from("/mock/dot");
        if let Some(sub) = subdir {
            path.push(sub);
        }
        path.push(name);
        lock(&self.files).insert(path.clone(), content.to_string());
        Ok(path)
    }

    async fn set_focused_settings(&self, plugin_id: Option<&PluginId>) -> anyhow::Result<()> {
        self.check("set_focused_settings")?;
        lock(&self.focused).push(plugin_id.cloned());
        Ok(())
    }

    async fn restore_editing_cursor(&self) -> anyhow::Result<()> {
        self.check("restore_editing_cursor")?;
        self.cursor_restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn invoke_exported(
        &self,
        _caller: &PluginId,
        method: &str,
        _args: &[Value],
    ) -> anyhow::Result<Value> {
        self.check("invoke_exported")?;
        match lock(&self.exports).get(method) {
            Some(value) => Ok(value.clone()),
            None => bail!("unknown method '{method}'"),
        }
    }
}

/// Descriptor for a minimal package with an HTML entry.
pub fn package(id: &str) -> Value {
    serde_json::json!({
        "name": id,
        "version": "0.1.0",
        "main": "index.html",
        "plugin": { "id": id }
    })
}

/// Options pointing at `origin`.
pub fn options(origin: &str) -> PluginOptions {
    PluginOptions::from_origin(origin)
}

// ============================================================================
// Sandbox
// ============================================================================

/// Channel recording every message it is asked to deliver.
#[derive(Debug, Default)]
pub struct MockChannel {
    messages: Mutex<Vec<OutboundMessage>>,
    connected: AtomicBool,
    destroyed: AtomicUsize,
    fail_connect: bool,
    fail_destroy: bool,
}

impl MockChannel {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        lock(&self.messages).clone()
    }

    pub fn message_types(&self) -> Vec<&'static str> {
        lock(&self.messages)
            .iter()
            .map(OutboundMessage::message_type)
            .collect()
    }

    pub fn hook_names(&self) -> Vec<String> {
        lock(&self.messages)
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::Hook { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn destroy_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SandboxChannel for MockChannel {
    async fn connect(&self) -> anyhow::Result<()> {
        if self.fail_connect {
            bail!("connect refused");
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn call_user_model(&self, message: OutboundMessage) -> anyhow::Result<()> {
        lock(&self.messages).push(message);
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if self.fail_destroy {
            bail!("destroy failed");
        }
        Ok(())
    }
}

/// Factory handing out [`MockChannel`]s and remembering each one.
#[derive(Debug, Default)]
pub struct MockSandboxFactory {
    opened: Mutex<Vec<(SandboxSpec, Arc<MockChannel>)>>,
    fail_open: Mutex<HashSet<String>>,
    fail_connect: Mutex<HashSet<String>>,
    fail_destroy: Mutex<HashSet<String>>,
}

impl MockSandboxFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_open(&self, plugin_id: &str) {
        lock(&self.fail_open).insert(plugin_id.to_string());
    }

    pub fn fail_connect(&self, plugin_id: &str) {
        lock(&self.fail_connect).insert(plugin_id.to_string());
    }

    pub fn fail_destroy(&self, plugin_id: &str) {
        lock(&self.fail_destroy).insert(plugin_id.to_string());
    }

    pub fn specs(&self) -> Vec<SandboxSpec> {
        lock(&self.opened).iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn open_count(&self, plugin_id: &str) -> usize {
        lock(&self.opened)
            .iter()
            .filter(|(s, _)| s.plugin_id == plugin_id)
            .count()
    }

    /// Most recently opened channel for `plugin_id`.
    pub fn channel(&self, plugin_id: &str) -> Option<Arc<MockChannel>> {
        lock(&self.opened)
            .iter()
            .rev()
            .find(|(s, _)| s.plugin_id == plugin_id)
            .map(|(_, c)| Arc::clone(c))
    }
}

#[async_trait]
impl SandboxFactory for MockSandboxFactory {
    async fn open(&self, spec: &SandboxSpec) -> anyhow::Result<Arc<dyn SandboxChannel>> {
        let id = spec.plugin_id.as_str();
        if lock(&self.fail_open).contains(id) {
            bail!("sandbox for {id} could not be created");
        }
        let channel = Arc::new(MockChannel {
            fail_connect: lock(&self.fail_connect).contains(id),
            fail_destroy: lock(&self.fail_destroy).contains(id),
            ..Default::default()
        });
        lock(&self.opened).push((spec.clone(), Arc::clone(&channel)));
        Ok(channel)
    }
}

// ============================================================================
// Presentation
// ============================================================================

/// Presentation double tracking injected themes, styles and fragments.
#[derive(Debug, Default)]
pub struct MockPresentation {
    themes: Mutex<Vec<String>>,
    styles: Mutex<HashMap<StyleHandle, (PluginId, String, String)>>,
    next_handle: AtomicU64,
    fragments: Mutex<Vec<(PluginId, UiFragment)>>,
    visible: Mutex<HashMap<PluginId, bool>>,
    attrs: Mutex<HashMap<PluginId, Map<String, Value>>>,
    style_calls: Mutex<Vec<(PluginId, Map<String, Value>)>>,
    focused: Mutex<Vec<PluginId>>,
    laid_out: Mutex<HashSet<PluginId>>,
    chrome: Mutex<HashSet<(PluginId, &'static str)>>,
}

impl MockPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently injected theme stylesheets.
    pub fn injected_themes(&self) -> Vec<String> {
        lock(&self.themes).clone()
    }

    pub fn style_keys(&self, scope: &str) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.styles)
            .values()
            .filter(|(pid, _, _)| pid == scope)
            .map(|(_, key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn fragments(&self) -> Vec<(PluginId, UiFragment)> {
        lock(&self.fragments).clone()
    }

    pub fn is_visible(&self, plugin_id: &str) -> bool {
        lock(&self.visible).get(plugin_id).copied().unwrap_or(false)
    }

    pub fn attrs(&self, plugin_id: &str) -> Option<Map<String, Value>> {
        lock(&self.attrs).get(plugin_id).cloned()
    }

    pub fn style_calls(&self) -> Vec<(PluginId, Map<String, Value>)> {
        lock(&self.style_calls).clone()
    }

    pub fn focus_count(&self, plugin_id: &str) -> usize {
        lock(&self.focused).iter().filter(|p| *p == plugin_id).count()
    }

    pub fn set_laid_out(&self, plugin_id: &str) {
        lock(&self.laid_out).insert(PluginId::new(plugin_id));
    }

    pub fn has_chrome(&self, plugin_id: &str, chrome: &'static str) -> bool {
        lock(&self.chrome).contains(&(PluginId::new(plugin_id), chrome))
    }
}

#[async_trait]
impl Presentation for MockPresentation {
    async fn inject_theme(&self, url: &str) -> anyhow::Result<()> {
        lock(&self.themes).push(url.to_string());
        Ok(())
    }

    async fn eject_theme(&self, url: &str) -> anyhow::Result<()> {
        lock(&self.themes).retain(|u| u != url);
        Ok(())
    }

    async fn inject_style(
        &self,
        scope: &PluginId,
        key: &str,
        css: &str,
    ) -> anyhow::Result<StyleHandle> {
        let handle = StyleHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        lock(&self.styles).insert(handle, (scope.clone(), key.to_string(), css.to_string()));
        Ok(handle)
    }

    async fn remove_style(&self, handle: StyleHandle) -> anyhow::Result<()> {
        lock(&self.styles).remove(&handle);
        Ok(())
    }

    async fn mount_fragment(&self, scope: &PluginId, fragment: &UiFragment) -> anyhow::Result<()> {
        let mut fragments = lock(&self.fragments);
        fragments.retain(|(pid, f)| !(pid == scope && f.key == fragment.key));
        fragments.push((scope.clone(), fragment.clone()));
        Ok(())
    }

    async fn unmount_fragment(&self, scope: &PluginId, key: &str) -> anyhow::Result<()> {
        lock(&self.fragments).retain(|(pid, f)| !(pid == scope && f.key == key));
        Ok(())
    }

    async fn set_main_ui_visible(
        &self,
        plugin_id: &PluginId,
        visible: bool,
    ) -> anyhow::Result<()> {
        lock(&self.visible).insert(plugin_id.clone(), visible);
        Ok(())
    }

    async fn set_main_ui_attrs(
        &self,
        plugin_id: &PluginId,
        attrs: &Map<String, Value>,
    ) -> anyhow::Result<()> {
        lock(&self.attrs)
            .entry(plugin_id.clone())
            .or_default()
            .extend(attrs.clone());
        Ok(())
    }

    async fn set_main_ui_style(
        &self,
        plugin_id: &PluginId,
        style: &Map<String, Value>,
    ) -> anyhow::Result<()> {
        lock(&self.style_calls).push((plugin_id.clone(), style.clone()));
        Ok(())
    }

    async fn focus_main_ui(&self, plugin_id: &PluginId) -> anyhow::Result<()> {
        lock(&self.focused).push(plugin_id.clone());
        Ok(())
    }

    async fn main_ui_laid_out(&self, plugin_id: &PluginId) -> bool {
        lock(&self.laid_out).contains(plugin_id)
    }

    async fn attach_draggable(&self, plugin_id: &PluginId) -> anyhow::Result<()> {
        lock(&self.chrome).insert((plugin_id.clone(), "draggable"));
        Ok(())
    }

    async fn detach_draggable(&self, plugin_id: &PluginId) -> anyhow::Result<()> {
        lock(&self.chrome).remove(&(plugin_id.clone(), "draggable"));
        Ok(())
    }

    async fn attach_resizable(&self, plugin_id: &PluginId) -> anyhow::Result<()> {
        lock(&self.chrome).insert((plugin_id.clone(), "resizable"));
        Ok(())
    }

    async fn detach_resizable(&self, plugin_id: &PluginId) -> anyhow::Result<()> {
        lock(&self.chrome).remove(&(plugin_id.clone(), "resizable"));
        Ok(())
    }
}
