#![allow(dead_code)]

use plughost_core::mock::{MockHost, MockPresentation, MockSandboxFactory};
use plughost_core::{CoreConfig, CoreEvent, HostContext, Orchestrator};
use std::sync::Arc;
use tokio::sync::broadcast;

pub const DOT_ROOT: &str = "/mock/dot";

pub struct Harness {
    pub host: Arc<MockHost>,
    pub sandboxes: Arc<MockSandboxFactory>,
    pub presentation: Arc<MockPresentation>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new() -> Self {
        let host = Arc::new(MockHost::new());
        let sandboxes = Arc::new(MockSandboxFactory::new());
        let presentation = Arc::new(MockPresentation::new());
        let ctx = HostContext::new(
            CoreConfig::with_dot_root(DOT_ROOT),
            host.clone(),
            sandboxes.clone(),
            presentation.clone(),
        );
        Self {
            host,
            sandboxes,
            presentation,
            orchestrator: Orchestrator::new(ctx),
        }
    }

    pub fn events(&self) -> broadcast::Receiver<CoreEvent> {
        self.orchestrator.subscribe()
    }
}

/// Lets spawned tasks (deferred `ready`, deferred UI mounts) run.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn drain(rx: &mut broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[CoreEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            CoreEvent::Registered(_) => "registered",
            CoreEvent::Unregistered(_) => "unregistered",
            CoreEvent::Error(_) => "error",
            CoreEvent::Ready(_) => "ready",
            CoreEvent::BeforeEnable(_) => "before-enable",
            CoreEvent::Enabled(_) => "enabled",
            CoreEvent::BeforeDisable(_) => "before-disable",
            CoreEvent::Disabled(_) => "disabled",
            CoreEvent::BeforeReload(_) => "before-reload",
            CoreEvent::Reloaded(_) => "reloaded",
            CoreEvent::SettingsChanged { .. } => "settings-changed",
            CoreEvent::ThemesChanged { .. } => "themes-changed",
            CoreEvent::ThemeSelected(_) => "theme-selected",
            CoreEvent::ResetCustomTheme(_) => "reset-custom-theme",
            CoreEvent::UnlinkPlugin(_) => "unlink-plugin",
        })
        .collect()
}
