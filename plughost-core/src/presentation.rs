//! Visual primitives provided by the host UI.

use crate::requests::UiFragment;
use async_trait::async_trait;
use plughost_types::PluginId;
use serde_json::{Map, Value};

/// Handle for an injected style block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleHandle(pub u64);

/// Host UI surface. The engine only decides *what* to show; mounting,
/// chrome and stylesheet handling belong to the implementation.
#[async_trait]
pub trait Presentation: Send + Sync {
    async fn inject_theme(&self, url: &str) -> anyhow::Result<()>;

    async fn eject_theme(&self, url: &str) -> anyhow::Result<()>;

    async fn inject_style(
        &self,
        scope: &PluginId,
        key: &str,
        css: &str,
    ) -> anyhow::Result<StyleHandle>;

    async fn remove_style(&self, handle: StyleHandle) -> anyhow::Result<()>;

    async fn mount_fragment(&self, scope: &PluginId, fragment: &UiFragment) -> anyhow::Result<()>;

    async fn unmount_fragment(&self, scope: &PluginId, key: &str) -> anyhow::Result<()>;

    async fn set_main_ui_visible(&self, plugin_id: &PluginId, visible: bool)
    -> anyhow::Result<()>;

    async fn set_main_ui_attrs(
        &self,
        plugin_id: &PluginId,
        attrs: &Map<String, Value>,
    ) -> anyhow::Result<()>;

    async fn set_main_ui_style(
        &self,
        plugin_id: &PluginId,
        style: &Map<String, Value>,
    ) -> anyhow::Result<()>;

    async fn focus_main_ui(&self, plugin_id: &PluginId) -> anyhow::Result<()>;

    /// True once the plugin's main surface has been given its initial layout.
    async fn main_ui_laid_out(&self, plugin_id: &PluginId) -> bool;

    async fn attach_draggable(&self, plugin_id: &PluginId) -> anyhow::Result<()>;

    async fn detach_draggable(&self, plugin_id: &PluginId) -> anyhow::Result<()>;

    async fn attach_resizable(&self, plugin_id: &PluginId) -> anyhow::Result<()>;

    async fn detach_resizable(&self, plugin_id: &PluginId) -> anyhow::Result<()>;
}
