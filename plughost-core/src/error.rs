//! Error types for the plugin lifecycle engine.

use plughost_settings::SettingsError;
use plughost_types::PluginId;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("illegal plugin package: {origin}: {message}")]
    Package { origin: String, message: String },

    #[error("registered plugin id exists: {0}")]
    DuplicateIdentity(PluginId),

    #[error("host call '{call}' failed: {message}")]
    HostCall { call: &'static str, message: String },

    #[error("sandbox error: {plugin_id}: {message}")]
    Sandbox { plugin_id: PluginId, message: String },

    #[error("plugin not found: {0}")]
    NotFound(String),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Discriminant of a [`PluginError`], cheap to clone into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginErrorKind {
    Package,
    DuplicateIdentity,
    HostCall,
    Sandbox,
    NotFound,
    Settings,
    Serialization,
}

impl PluginError {
    pub fn package(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Package {
            origin: origin.into(),
            message: message.into(),
        }
    }

    pub fn host_call(call: &'static str, err: anyhow::Error) -> Self {
        Self::HostCall {
            call,
            message: format!("{err:#}"),
        }
    }

    pub fn sandbox(plugin_id: &PluginId, err: impl std::fmt::Display) -> Self {
        Self::Sandbox {
            plugin_id: plugin_id.clone(),
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> PluginErrorKind {
        match self {
            Self::Package { .. } => PluginErrorKind::Package,
            Self::DuplicateIdentity(_) => PluginErrorKind::DuplicateIdentity,
            Self::HostCall { .. } => PluginErrorKind::HostCall,
            Self::Sandbox { .. } => PluginErrorKind::Sandbox,
            Self::NotFound(_) => PluginErrorKind::NotFound,
            Self::Settings(_) => PluginErrorKind::Settings,
            Self::Serialization(_) => PluginErrorKind::Serialization,
        }
    }

    /// Package and identity failures keep a unit out of the registry.
    pub fn is_fatal_for_registration(&self) -> bool {
        self.kind().is_fatal_for_registration()
    }
}

impl PluginErrorKind {
    pub fn is_fatal_for_registration(self) -> bool {
        matches!(self, Self::Package | Self::DuplicateIdentity)
    }
}

pub type PluginResult<T> = Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_call_keeps_context_chain() {
        let err = anyhow::anyhow!("disk full").context("writing settings");
        let err = PluginError::host_call("save_plugin_user_settings", err);
        assert_eq!(err.kind(), PluginErrorKind::HostCall);
        assert_eq!(
            err.to_string(),
            "host call 'save_plugin_user_settings' failed: writing settings: disk full"
        );
    }

    #[test]
    fn registration_fatality() {
        assert!(PluginError::package("/p", "missing").is_fatal_for_registration());
        assert!(PluginError::DuplicateIdentity(PluginId::new("a")).is_fatal_for_registration());
        assert!(!PluginError::sandbox(&PluginId::new("a"), "boom").is_fatal_for_registration());
    }
}
