//! Requests a plugin sends to the host through its sandbox channel.

use plughost_settings::Settings;
use plughost_types::{SettingSchemaItem, ThemeDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of sandbox-originated requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum SandboxRequest {
    Settings(SettingsRequest),
    MainUi(MainUiRequest),
    Provider(ProviderRequest),
    ApiCall(ApiCall),
    SdkMetadata { version: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum SettingsRequest {
    Schema {
        schema: Vec<SettingSchemaItem>,
        #[serde(default)]
        reconcile: bool,
    },
    Update(Settings),
    PanelVisible(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum MainUiRequest {
    #[serde(rename_all = "camelCase")]
    Visible {
        #[serde(default)]
        visible: bool,
        #[serde(default)]
        toggle: bool,
        #[serde(default)]
        auto_focus: bool,
        #[serde(default)]
        restore_cursor: bool,
    },
    Attrs(Map<String, Value>),
    Style(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ProviderRequest {
    Theme(ThemeDescriptor),
    Style {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        css: String,
    },
    Ui(UiFragment),
}

/// UI fragment a plugin asks the host to mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiFragment {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub template: String,
    #[serde(default)]
    pub reset: bool,
}

/// Call of a host-exported API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCall {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Token echoed in the reply for isolated sandboxes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
}

impl SandboxRequest {
    pub fn api_call(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self::ApiCall(ApiCall {
            method: method.into(),
            args,
            correlation: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_wire_form() {
        let req: SandboxRequest = serde_json::from_value(json!({
            "type": "main-ui",
            "data": { "type": "visible", "data": { "toggle": true, "autoFocus": true } }
        }))
        .unwrap();
        assert_eq!(
            req,
            SandboxRequest::MainUi(MainUiRequest::Visible {
                visible: false,
                toggle: true,
                auto_focus: true,
                restore_cursor: false,
            })
        );

        let req: SandboxRequest = serde_json::from_value(json!({
            "type": "api-call",
            "data": { "method": "get_current_page", "correlation": "c7" }
        }))
        .unwrap();
        match req {
            SandboxRequest::ApiCall(call) => {
                assert!(call.args.is_empty());
                assert_eq!(call.correlation.as_deref(), Some("c7"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
