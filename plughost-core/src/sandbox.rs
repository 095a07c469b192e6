//! Sandbox channel abstraction.
//!
//! The engine never runs plugin code. It opens a channel through a
//! [`SandboxFactory`] and talks to the plugin with [`OutboundMessage`]s.

use async_trait::async_trait;
use plughost_settings::Settings;
use plughost_types::{ExecutionMode, PluginId};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a factory needs to start one plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxSpec {
    pub plugin_id: PluginId,
    /// Effective entry url.
    pub entry: String,
    pub mode: ExecutionMode,
    pub package_root: PathBuf,
}

/// Message sent from the host into a plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundMessage {
    Ready {
        pid: PluginId,
    },
    BeforeUnload {
        unregister: bool,
    },
    Hook {
        name: String,
        ns: String,
        kind: String,
        payload: Value,
    },
    Settings {
        payload: Settings,
    },
    SyncReply {
        token: String,
        result: Result<Value, String>,
    },
}

impl OutboundMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::BeforeUnload { .. } => "before-unload",
            Self::Hook { .. } => "hook",
            Self::Settings { .. } => "settings",
            Self::SyncReply { .. } => "sync-reply",
        }
    }
}

/// A live connection to one plugin's sandbox.
#[async_trait]
pub trait SandboxChannel: Send + Sync {
    async fn connect(&self) -> anyhow::Result<()>;

    async fn call_user_model(&self, message: OutboundMessage) -> anyhow::Result<()>;

    /// Tears the sandbox down. Called once, from the unit's disposal stack.
    async fn destroy(&self) -> anyhow::Result<()>;
}

/// Opens sandbox channels.
#[async_trait]
pub trait SandboxFactory: Send + Sync {
    async fn open(&self, spec: &SandboxSpec) -> anyhow::Result<Arc<dyn SandboxChannel>>;
}
