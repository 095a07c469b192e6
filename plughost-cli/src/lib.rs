//! Offline inspection of plugin packages.
//!
//! Runs a registration pass over the filesystem host with a sandbox that
//! never executes plugin code, and reports what each package resolved to.

use async_trait::async_trait;
use plughost_core::{
    CoreConfig, CoreEvent, FsHost, HostContext, Orchestrator, OutboundMessage, PluginErrorKind,
    PluginUnit, Presentation, SandboxChannel, SandboxFactory, SandboxSpec, StyleHandle,
    UiFragment,
};
use plughost_types::{ExecutionMode, LifecycleStatus, PluginId, PluginOptions};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

// ============================================================================
// Offline collaborators
// ============================================================================

/// Sandbox factory whose channels accept and drop every message.
#[derive(Debug, Default)]
pub struct OfflineSandboxes;

#[async_trait]
impl SandboxFactory for OfflineSandboxes {
    async fn open(&self, spec: &SandboxSpec) -> anyhow::Result<Arc<dyn SandboxChannel>> {
        debug!(plugin_id = %spec.plugin_id, entry = %spec.entry, mode = ?spec.mode, "offline sandbox opened");
        Ok(Arc::new(OfflineChannel {
            plugin_id: spec.plugin_id.clone(),
        }))
    }
}

#[derive(Debug)]
struct OfflineChannel {
    plugin_id: PluginId,
}

#[async_trait]
impl SandboxChannel for OfflineChannel {
    async fn connect(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn call_user_model(&self, message: OutboundMessage) -> anyhow::Result<()> {
        debug!(plugin_id = %self.plugin_id, message = message.message_type(), "message dropped");
        Ok(())
    }

    async fn destroy(&self) -> anyhow::Result<()> {
        debug!(plugin_id = %self.plugin_id, "offline sandbox destroyed");
        Ok(())
    }
}

/// Presentation that only logs what it is asked to show.
#[derive(Debug, Default)]
pub struct LogPresentation {
    next_handle: AtomicU64,
}

#[async_trait]
impl Presentation for LogPresentation {
    async fn inject_theme(&self, url: &str) -> anyhow::Result<()> {
        debug!(url, "inject theme");
        Ok(())
    }

    async fn eject_theme(&self, url: &str) -> anyhow::Result<()> {
        debug!(url, "eject theme");
        Ok(())
    }

    async fn inject_style(
        &self,
        scope: &PluginId,
        key: &str,
        _css: &str,
    ) -> anyhow::Result<StyleHandle> {
        debug!(plugin_id = %scope, key, "inject style");
        Ok(StyleHandle(self.next_handle.fetch_add(1, Ordering::Relaxed)))
    }

    async fn remove_style(&self, handle: StyleHandle) -> anyhow::Result<()> {
        debug!(handle = handle.0, "remove style");
        Ok(())
    }

    async fn mount_fragment(&self, scope: &PluginId, fragment: &UiFragment) -> anyhow::Result<()> {
        debug!(plugin_id = %scope, key = %fragment.key, "mount fragment");
        Ok(())
    }

    async fn unmount_fragment(&self, scope: &PluginId, key: &str) -> anyhow::Result<()> {
        debug!(plugin_id = %scope, key, "unmount fragment");
        Ok(())
    }

    async fn set_main_ui_visible(
        &self,
        plugin_id: &PluginId,
        visible: bool,
    ) -> anyhow::Result<()> {
        debug!(plugin_id = %plugin_id, visible, "main ui visibility");
        Ok(())
    }

    async fn set_main_ui_attrs(
        &self,
        _plugin_id: &PluginId,
        _attrs: &Map<String, Value>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn set_main_ui_style(
        &self,
        _plugin_id: &PluginId,
        _style: &Map<String, Value>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn focus_main_ui(&self, _plugin_id: &PluginId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn main_ui_laid_out(&self, _plugin_id: &PluginId) -> bool {
        false
    }

    async fn attach_draggable(&self, _plugin_id: &PluginId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn detach_draggable(&self, _plugin_id: &PluginId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn attach_resizable(&self, _plugin_id: &PluginId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn detach_resizable(&self, _plugin_id: &PluginId) -> anyhow::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Report
// ============================================================================

/// One registered plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginReport {
    pub id: String,
    pub origin: String,
    pub status: LifecycleStatus,
    pub title: Option<String>,
    pub version: Option<String>,
    pub mode: ExecutionMode,
    pub entry: Option<String>,
    pub managed: bool,
    pub themes: usize,
    pub error: Option<String>,
}

impl PluginReport {
    fn from_unit(unit: &PluginUnit, themes: usize) -> Self {
        let options = unit.options();
        Self {
            id: unit.id().to_string(),
            origin: unit.origin().to_string(),
            status: unit.status(),
            title: options.title.clone().or(options.name.clone()),
            version: options.version,
            mode: options.mode,
            entry: unit.effective_entry().or(options.entry),
            managed: unit.is_managed(),
            themes,
            error: unit.load_error().map(|e| e.to_string()),
        }
    }
}

/// A package that could not be registered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub origin: String,
    pub kind: PluginErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub plugins: Vec<PluginReport>,
    pub rejected: Vec<Rejection>,
}

impl Report {
    /// True when every package registered and loaded cleanly.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.plugins.iter().all(|p| p.error.is_none())
    }
}

/// Registers `packages` against the filesystem host and reports the result.
///
/// Every unit is unloaded again before returning. Registration records
/// external origins in the user preferences under the dot directory.
pub async fn check(config: CoreConfig, packages: &[PathBuf]) -> Report {
    let host = Arc::new(FsHost::new(&config));
    let ctx = HostContext::new(
        config,
        host,
        Arc::new(OfflineSandboxes),
        Arc::new(LogPresentation::default()),
    );
    let orchestrator = Orchestrator::new(Arc::clone(&ctx));
    let mut events = orchestrator.subscribe();

    let options: Vec<PluginOptions> = packages
        .iter()
        .map(|p| PluginOptions::from_origin(p.display().to_string()))
        .collect();
    orchestrator.register(options, false).await;

    let mut rejected = Vec::new();
    loop {
        match events.try_recv() {
            Ok(CoreEvent::Error(failure)) if failure.kind.is_fatal_for_registration() => {
                rejected.push(Rejection {
                    origin: failure.origin,
                    kind: failure.kind,
                    message: failure.message,
                });
            }
            Ok(_) => {}
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed registration events");
            }
            Err(_) => break,
        }
    }

    let plugins = orchestrator
        .plugins()
        .iter()
        .map(|unit| PluginReport::from_unit(unit, ctx.themes_of(&unit.id()).len()))
        .collect();
    orchestrator.teardown().await;

    let report = Report { plugins, rejected };
    info!(
        registered = report.plugins.len(),
        rejected = report.rejected.len(),
        "Check finished"
    );
    report
}
