//! Theme descriptors contributed by plugins.

use crate::PluginId;
use serde::{Deserialize, Serialize};

/// Light/dark appearance a theme targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

/// A theme contribution. A descriptor without a location stands for the
/// built-in default theme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ThemeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<PluginId>,
}

impl ThemeDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// The built-in theme: no stylesheet to inject.
    pub fn builtin(mode: Option<ThemeMode>) -> Self {
        Self {
            name: "default".to_string(),
            mode,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ThemeMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn owned_by(mut self, pid: impl Into<PluginId>) -> Self {
        self.pid = Some(pid.into());
        self
    }

    /// Stylesheet location, ignoring empty strings.
    pub fn location(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    pub fn is_owned_by(&self, pid: &PluginId) -> bool {
        self.pid.as_ref() == Some(pid)
    }
}
