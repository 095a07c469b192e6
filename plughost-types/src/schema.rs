//! Settings schema declarations.
//!
//! Plugins declare their settings either in the package descriptor or at
//! runtime from the sandbox. The store in `plughost-settings` reconciles the
//! persisted values against these declarations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value kind of a declared setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    String,
    Number,
    Boolean,
    Enum,
    Object,
    /// Section title in a settings panel; carries no value.
    Heading,
}

/// How an enum setting is presented. `Checkbox` allows several choices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumPicker {
    #[default]
    Select,
    Radio,
    Checkbox,
}

/// One declared setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingSchemaItem {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: SettingKind,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_picker: Option<EnumPicker>,
}

impl SettingSchemaItem {
    pub fn new(key: impl Into<String>, kind: SettingKind, default: Value) -> Self {
        Self {
            key: key.into(),
            kind,
            default,
            title: String::new(),
            description: String::new(),
            enum_choices: Vec::new(),
            enum_picker: None,
        }
    }

    pub fn heading(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::new(key, SettingKind::Heading, Value::Null)
        }
    }

    #[must_use]
    pub fn with_choices<I, S>(mut self, choices: I, picker: EnumPicker) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_choices = choices.into_iter().map(Into::into).collect();
        self.enum_picker = Some(picker);
        self
    }

    /// Headings are presentation-only and never stored.
    #[must_use]
    pub fn carries_value(&self) -> bool {
        self.kind != SettingKind::Heading
    }

    #[must_use]
    pub fn is_multi_choice(&self) -> bool {
        self.kind == SettingKind::Enum && self.enum_picker == Some(EnumPicker::Checkbox)
    }
}
