//! Per-plugin options: where the plugin comes from and what its package
//! declared about itself.

use crate::SettingSchemaItem;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Sandbox strategy used to run a plugin's entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Separate execution context; calls round-trip through messages.
    #[default]
    #[serde(rename = "iframe")]
    Isolated,
    /// Shares the host context; calls return directly to the caller.
    #[serde(rename = "shadow")]
    Direct,
}

impl ExecutionMode {
    /// Maps a descriptor's `mode` field. Unknown values fall back to isolation.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "shadow" | "direct" => Self::Direct,
            _ => Self::Isolated,
        }
    }
}

/// Description of one plugin, seeded by the caller with its origin and
/// completed during package resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginOptions {
    /// Origin location: the package root (path or `file://` url).
    pub url: String,
    /// Explicit identity requested by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sponsors: Vec<String>,
    /// Package contributes side effects only.
    #[serde(default)]
    pub effect: bool,
    /// Package contributes at least one theme.
    #[serde(default)]
    pub theme: bool,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_schema: Option<Vec<SettingSchemaItem>>,
    /// Extension fields merged from the package's host section.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PluginOptions {
    pub fn from_origin(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    #[must_use]
    pub fn has_entry(&self) -> bool {
        self.entry.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Human-readable label: title, then name, then origin.
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.url)
    }

    /// Package root on the local filesystem.
    pub fn local_root(&self) -> PathBuf {
        let trimmed = self.url.strip_prefix("file://").unwrap_or(&self.url);
        PathBuf::from(trimmed.trim_end_matches('/'))
    }
}
