//! Filesystem-backed host API.
//!
//! Package descriptors are read from `<package root>/package.json`; plugin
//! settings and user preferences live as JSON under the dot directory.

use crate::config::CoreConfig;
use crate::host::HostApi;
use anyhow::{Context, bail};
use async_trait::async_trait;
use plughost_settings::Settings;
use plughost_types::{PluginId, PluginOptions, UserPreferences};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

const PACKAGE_FILE: &str = "package.json";
const PREFERENCES_FILE: &str = "preferences.json";
const SETTINGS_DIR: &str = "settings";

/// [`HostApi`] over the local filesystem. Exports no callable API.
#[derive(Debug)]
pub struct FsHost {
    dot_root: PathBuf,
    tmp_root: PathBuf,
    focused: Mutex<Option<PluginId>>,
}

impl FsHost {
    pub fn new(config: &CoreConfig) -> Self {
        Self::with_roots(&config.dot_root, std::env::temp_dir().join("plughost"))
    }

    pub fn with_roots(dot_root: impl Into<PathBuf>, tmp_root: impl Into<PathBuf>) -> Self {
        Self {
            dot_root: dot_root.into(),
            tmp_root: tmp_root.into(),
            focused: Mutex::new(None),
        }
    }

    pub fn settings_file(&self, plugin_id: &PluginId) -> PathBuf {
        self.dot_root
            .join(SETTINGS_DIR)
            .join(format!("{plugin_id}.json"))
    }

    pub fn preferences_file(&self) -> PathBuf {
        self.dot_root.join(PREFERENCES_FILE)
    }

    /// Plugin whose settings panel is currently shown.
    pub fn focused_settings(&self) -> Option<PluginId> {
        self.focused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn package_file(origin: &str) -> PathBuf {
    PluginOptions::from_origin(origin).local_root().join(PACKAGE_FILE)
}

async fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

async fn read_optional(path: &Path) -> anyhow::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

#[async_trait]
impl HostApi for FsHost {
    async fn load_plugin_config(&self, origin: &str) -> anyhow::Result<Option<String>> {
        read_optional(&package_file(origin)).await
    }

    async fn save_plugin_config(&self, origin: &str, descriptor: &Value) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(descriptor)?;
        write_file(&package_file(origin), &text).await
    }

    async fn load_plugin_user_settings(
        &self,
        plugin_id: &PluginId,
    ) -> anyhow::Result<(PathBuf, Settings)> {
        let path = self.settings_file(plugin_id);
        let settings = match read_optional(&path).await? {
            Some(text) if !text.trim().is_empty() => match serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?
            {
                Value::Object(map) => map,
                _ => bail!("{} does not hold an object", path.display()),
            },
            _ => Settings::new(),
        };
        Ok((path, settings))
    }

    async fn save_plugin_user_settings(
        &self,
        plugin_id: &PluginId,
        settings: &Settings,
    ) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(settings)?;
        write_file(&self.settings_file(plugin_id), &text).await
    }

    async fn load_user_preferences(&self) -> anyhow::Result<Option<UserPreferences>> {
        let path = self.preferences_file();
        match read_optional(&path).await? {
            Some(text) => Ok(Some(
                serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?,
            )),
            None => Ok(None),
        }
    }

    async fn save_user_preferences(&self, preferences: &UserPreferences) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(preferences)?;
        write_file(&self.preferences_file(), &text).await
    }

    async fn validate_external_plugins(
        &self,
        origins: &[String],
    ) -> anyhow::Result<HashMap<String, bool>> {
        let mut validity = HashMap::with_capacity(origins.len());
        for origin in origins {
            let exists = tokio::fs::try_exists(package_file(origin))
                .await
                .unwrap_or(false);
            validity.insert(origin.clone(), exists);
        }
        Ok(validity)
    }

    async fn should_exec_plugin_hook(
        &self,
        _plugin_id: &PluginId,
        _hook: &str,
    ) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn write_user_tmp_file(&self, name: &str, content: &str) -> anyhow::Result<PathBuf> {
        let path = self.tmp_root.join(name);
        write_file(&path, content).await?;
        Ok(path)
    }

    async fn write_dotdir_file(
        &self,
        name: &str,
        content: &str,
        subdir: Option<&str>,
    ) -> anyhow::Result<PathBuf> {
        let dir = match subdir {
            Some(sub) => self.dot_root.join(sub),
            None => self.dot_root.clone(),
        };
        let path = dir.join(name);
        write_file(&path, content).await?;
        Ok(path)
    }

    async fn set_focused_settings(&self, plugin_id: Option<&PluginId>) -> anyhow::Result<()> {
        debug!(plugin_id = ?plugin_id, "focused settings");
        *self.focused.lock().unwrap_or_else(PoisonError::into_inner) = plugin_id.cloned();
        Ok(())
    }

    async fn restore_editing_cursor(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn invoke_exported(
        &self,
        _caller: &PluginId,
        method: &str,
        _args: &[Value],
    ) -> anyhow::Result<Value> {
        bail!("no exported api named '{method}'")
    }
}
