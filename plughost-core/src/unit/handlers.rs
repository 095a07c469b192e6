//! Dispatch of sandbox-originated requests.

use super::{PluginUnit, resolve_url};
use crate::events::UnitEvent;
use crate::requests::{
    ApiCall, MainUiRequest, ProviderRequest, SandboxRequest, SettingsRequest, UiFragment,
};
use crate::sandbox::OutboundMessage;
use plughost_types::{ExecutionMode, PluginId, ThemeDescriptor};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Style keys that stop applying once the surface has its initial layout.
const LAYOUT_KEYS: [&str; 6] = ["left", "top", "bottom", "right", "width", "height"];

#[derive(Debug, Clone, Copy)]
enum Chrome {
    Draggable,
    Resizable,
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

impl PluginUnit {
    /// Handles one request from the unit's sandbox.
    ///
    /// Returns the reply for direct-mode api calls; everything else is
    /// answered through side effects (or a `SyncReply` message).
    pub async fn handle_request(&self, request: SandboxRequest) -> Option<Result<Value, String>> {
        let reply = self.dispatch_request(request).await;
        self.drain_commands().await;
        reply
    }

    async fn dispatch_request(&self, request: SandboxRequest) -> Option<Result<Value, String>> {
        match request {
            SandboxRequest::Settings(req) => {
                self.on_settings(req).await;
                None
            }
            SandboxRequest::MainUi(req) => {
                self.on_main_ui(req).await;
                None
            }
            SandboxRequest::Provider(req) => {
                self.on_provider(req).await;
                None
            }
            SandboxRequest::ApiCall(call) => self.on_api_call(call).await,
            SandboxRequest::SdkMetadata { version } => {
                debug!(plugin_id = %self.id(), version = %version, "runtime version reported");
                self.state().sdk_version = Some(version);
                None
            }
        }
    }

    async fn on_settings(&self, request: SettingsRequest) {
        let id = self.id();
        match request {
            SettingsRequest::Schema { schema, reconcile } => match self.settings() {
                Some(store) => {
                    if let Err(e) = store.set_schema(schema, reconcile) {
                        warn!(plugin_id = %id, "Rejected settings schema: {e}");
                    }
                }
                None => warn!(plugin_id = %id, "settings schema before settings were loaded"),
            },
            SettingsRequest::Update(partial) => {
                if let Some(store) = self.settings() {
                    store.merge(partial);
                }
            }
            SettingsRequest::PanelVisible(visible) => {
                let target = visible.then_some(&id);
                if let Err(e) = self.ctx.host().set_focused_settings(target).await {
                    warn!(plugin_id = %id, "Failed to toggle settings panel: {e:#}");
                }
            }
        }
    }

    async fn on_main_ui(&self, request: MainUiRequest) {
        let id = self.id();
        let presentation = self.ctx.presentation();
        match request {
            MainUiRequest::Visible {
                visible,
                toggle,
                auto_focus,
                restore_cursor,
            } => {
                let visible = {
                    let mut state = self.state();
                    state.main_ui_visible = if toggle {
                        !state.main_ui_visible
                    } else {
                        visible
                    };
                    state.main_ui_visible
                };
                if let Err(e) = presentation.set_main_ui_visible(&id, visible).await {
                    warn!(plugin_id = %id, "Failed to toggle main ui: {e:#}");
                }
                self.emit(UnitEvent::MainUiVisible(visible));

                if !visible && restore_cursor {
                    if let Err(e) = self.ctx.host().restore_editing_cursor().await {
                        warn!(plugin_id = %id, "Failed to restore editing cursor: {e:#}");
                    }
                }
                if visible && auto_focus {
                    if let Err(e) = presentation.focus_main_ui(&id).await {
                        debug!(plugin_id = %id, "focus failed: {e:#}");
                    }
                }
            }
            MainUiRequest::Attrs(attrs) => {
                if let Err(e) = presentation.set_main_ui_attrs(&id, &attrs).await {
                    warn!(plugin_id = %id, "Failed to set main ui attrs: {e:#}");
                }
                if truthy(attrs.get("draggable")) {
                    self.wire_chrome(&id, Chrome::Draggable).await;
                }
                if truthy(attrs.get("resizable")) {
                    self.wire_chrome(&id, Chrome::Resizable).await;
                }
            }
            MainUiRequest::Style(style) => {
                let style = if presentation.main_ui_laid_out(&id).await {
                    strip_layout(style)
                } else {
                    style
                };
                if let Err(e) = presentation.set_main_ui_style(&id, &style).await {
                    warn!(plugin_id = %id, "Failed to set main ui style: {e:#}");
                }
            }
        }
    }

    /// Attaches drag or resize chrome once per load and queues its removal.
    async fn wire_chrome(&self, id: &PluginId, chrome: Chrome) {
        let first = {
            let mut state = self.state();
            let flag = match chrome {
                Chrome::Draggable => &mut state.draggable,
                Chrome::Resizable => &mut state.resizable,
            };
            !std::mem::replace(flag, true)
        };
        if !first {
            return;
        }

        let presentation = Arc::clone(self.ctx.presentation());
        let attached = match chrome {
            Chrome::Draggable => presentation.attach_draggable(id).await,
            Chrome::Resizable => presentation.attach_resizable(id).await,
        };
        if let Err(e) = attached {
            warn!(plugin_id = %id, chrome = ?chrome, "Failed to attach chrome: {e:#}");
            let mut state = self.state();
            match chrome {
                Chrome::Draggable => state.draggable = false,
                Chrome::Resizable => state.resizable = false,
            }
            return;
        }

        let id = id.clone();
        let label = match chrome {
            Chrome::Draggable => "draggable",
            Chrome::Resizable => "resizable",
        };
        self.disposals.push(label, move || async move {
            match chrome {
                Chrome::Draggable => presentation.detach_draggable(&id).await,
                Chrome::Resizable => presentation.detach_resizable(&id).await,
            }
        });
    }

    async fn on_provider(&self, request: ProviderRequest) {
        let id = self.id();
        match request {
            ProviderRequest::Theme(theme) => self.provide_theme(&id, theme),
            ProviderRequest::Style { key, css } => self.provide_style(&id, key, css).await,
            ProviderRequest::Ui(fragment) => self.provide_ui(&id, fragment).await,
        }
    }

    fn provide_theme(&self, id: &PluginId, mut theme: ThemeDescriptor) {
        let root = self.state().options.local_root();
        theme.url = theme.location().map(|url| resolve_url(&root, url));
        self.ctx.register_theme(id, theme);
        self.push_theme_release(id);
    }

    /// Injects `css` once per key. Unkeyed styles each get their own key.
    async fn provide_style(&self, id: &PluginId, key: Option<String>, css: String) {
        if css.trim().is_empty() {
            return;
        }
        let (key, fresh) = {
            let mut state = self.state();
            let key = key.filter(|k| !k.is_empty()).unwrap_or_else(|| {
                state.unkeyed_styles += 1;
                format!("{id}-style-{}", state.unkeyed_styles)
            });
            let fresh = state.styles.insert(key.clone());
            (key, fresh)
        };
        if !fresh {
            debug!(plugin_id = %id, key = %key, "style already provided");
            return;
        }

        let presentation = Arc::clone(self.ctx.presentation());
        match presentation.inject_style(id, &key, &css).await {
            Ok(handle) => {
                self.disposals.push(format!("style:{key}"), move || async move {
                    presentation.remove_style(handle).await
                });
            }
            Err(e) => {
                warn!(plugin_id = %id, key = %key, "Failed to inject style: {e:#}");
                self.state().styles.remove(&key);
            }
        }
    }

    /// Mounts now if the host UI is up, otherwise once it is.
    async fn provide_ui(&self, id: &PluginId, fragment: UiFragment) {
        let fresh = self.state().fragments.insert(fragment.key.clone());
        let presentation = Arc::clone(self.ctx.presentation());
        if fresh {
            let (presentation, id, key) = (Arc::clone(&presentation), id.clone(), fragment.key.clone());
            self.disposals.push(format!("ui:{key}"), move || async move {
                presentation.unmount_fragment(&id, &key).await
            });
        }

        if self.ctx.is_host_mounted() {
            if let Err(e) = presentation.mount_fragment(id, &fragment).await {
                warn!(plugin_id = %id, key = %fragment.key, "Failed to mount ui: {e:#}");
            }
            return;
        }

        debug!(plugin_id = %id, key = %fragment.key, "deferring ui until host is mounted");
        let mounted = self.ctx.mounted_signal();
        let id = id.clone();
        tokio::spawn(async move {
            mounted.wait().await;
            if let Err(e) = presentation.mount_fragment(&id, &fragment).await {
                warn!(plugin_id = %id, key = %fragment.key, "Failed to mount ui: {e:#}");
            }
        });
    }

    async fn on_api_call(&self, call: ApiCall) -> Option<Result<Value, String>> {
        let (id, mode) = {
            let state = self.state();
            (state.id.clone(), state.options.mode)
        };
        let result = self
            .ctx
            .host()
            .invoke_exported(&id, &call.method, &call.args)
            .await
            .map_err(|e| format!("{e:#}"));
        if let Err(e) = &result {
            debug!(plugin_id = %id, method = %call.method, "exported call failed: {e}");
        }

        match (mode, call.correlation) {
            (ExecutionMode::Direct, _) => Some(result),
            (ExecutionMode::Isolated, Some(token)) => {
                let reply = OutboundMessage::SyncReply { token, result };
                if let Err(e) = self.call_user_model(reply).await {
                    warn!(plugin_id = %id, method = %call.method, "Failed to deliver reply: {e}");
                }
                None
            }
            (ExecutionMode::Isolated, None) => None,
        }
    }
}

fn strip_layout(mut style: Map<String, Value>) -> Map<String, Value> {
    style.retain(|key, _| !LAYOUT_KEYS.contains(&key.as_str()));
    style
}
