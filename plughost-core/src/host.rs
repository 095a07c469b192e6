//! Native host capabilities the engine depends on.

use async_trait::async_trait;
use plughost_settings::Settings;
use plughost_types::{PluginId, UserPreferences};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Host-side API used by plugin units and the orchestrator.
///
/// Implementations report failures as `anyhow::Error`; the engine maps them
/// to [`crate::PluginError::HostCall`] or logs and continues, depending on
/// the call site.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Raw package descriptor text for a package root, `None` if absent.
    async fn load_plugin_config(&self, origin: &str) -> anyhow::Result<Option<String>>;

    /// Writes a package descriptor back to its package root.
    async fn save_plugin_config(&self, origin: &str, descriptor: &Value) -> anyhow::Result<()>;

    /// Persisted settings for a plugin, with the location they live at.
    async fn load_plugin_user_settings(
        &self,
        plugin_id: &PluginId,
    ) -> anyhow::Result<(PathBuf, Settings)>;

    async fn save_plugin_user_settings(
        &self,
        plugin_id: &PluginId,
        settings: &Settings,
    ) -> anyhow::Result<()>;

    async fn load_user_preferences(&self) -> anyhow::Result<Option<UserPreferences>>;

    async fn save_user_preferences(&self, preferences: &UserPreferences) -> anyhow::Result<()>;

    /// Validity per external origin. Origins mapped to `false` or missing
    /// from the result are dropped.
    async fn validate_external_plugins(
        &self,
        origins: &[String],
    ) -> anyhow::Result<HashMap<String, bool>>;

    async fn should_exec_plugin_hook(&self, plugin_id: &PluginId, hook: &str)
    -> anyhow::Result<bool>;

    async fn write_user_tmp_file(&self, name: &str, content: &str) -> anyhow::Result<PathBuf>;

    async fn write_dotdir_file(
        &self,
        name: &str,
        content: &str,
        subdir: Option<&str>,
    ) -> anyhow::Result<PathBuf>;

    /// Shows the settings panel of `plugin_id`, or hides it for `None`.
    async fn set_focused_settings(&self, plugin_id: Option<&PluginId>) -> anyhow::Result<()>;

    async fn restore_editing_cursor(&self) -> anyhow::Result<()>;

    /// Invokes a host-exported method on behalf of a plugin.
    async fn invoke_exported(
        &self,
        caller: &PluginId,
        method: &str,
        args: &[Value],
    ) -> anyhow::Result<Value>;
}
