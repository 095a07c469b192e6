//! Package descriptor (`package.json`) parsing.
//!
//! A plugin package is an npm-style `package.json` with a host section under
//! the `plugin` key. The raw document is retained so that a freshly minted
//! identity can be written back without losing unknown fields.

use crate::{Error, Result, SettingSchemaItem, ThemeDescriptor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Key of the host section inside `package.json`.
pub const HOST_SECTION: &str = "plugin";

/// Host-specific part of a package descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub theme: bool,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<ThemeDescriptor>,
    #[serde(default)]
    pub effect: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Vec<SettingSchemaItem>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ThemeDescriptor>),
    One(ThemeDescriptor),
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<ThemeDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(theme)) => vec![theme],
        Some(OneOrMany::Many(themes)) => themes,
        None => Vec::new(),
    })
}

/// Parsed package descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    raw: Value,
    section: HostSection,
}

impl PackageDescriptor {
    /// Parses descriptor text. The document must be a JSON object.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(text)?;
        Self::from_value(raw)
    }

    pub fn from_value(raw: Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(Error::InvalidDescriptor(
                "package descriptor is not a JSON object".to_string(),
            ));
        }
        let section = match raw.get(HOST_SECTION) {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone())?,
            _ => HostSection::default(),
        };
        Ok(Self { raw, section })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn section(&self) -> &HostSection {
        &self.section
    }

    /// Top-level text field. npm-style `{ "name": .. }` / `{ "url": .. }`
    /// objects (author, repository) collapse to their first text member.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.raw.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(obj) => ["name", "url"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        }
    }

    pub fn declared_id(&self) -> Option<&str> {
        self.section.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Records an identity in both the typed section and the raw document.
    pub fn set_declared_id(&mut self, id: &str) {
        self.section.id = Some(id.to_string());
        if let Some(root) = self.raw.as_object_mut() {
            let section = root
                .entry(HOST_SECTION)
                .or_insert_with(|| Value::Object(Map::new()));
            if !section.is_object() {
                *section = Value::Object(Map::new());
            }
            if let Some(section) = section.as_object_mut() {
                section.insert("id".to_string(), Value::String(id.to_string()));
            }
        }
    }

    /// Declared entry: the host section's `main`, else the top-level `main`.
    pub fn main(&self) -> Option<String> {
        self.section
            .main
            .clone()
            .or_else(|| self.text("main"))
            .filter(|m| !m.is_empty())
    }

    pub fn title(&self) -> Option<String> {
        self.section.title.clone().or_else(|| self.text("title"))
    }

    pub fn effect(&self) -> bool {
        self.section.effect || self.raw.get("effect").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn sponsors(&self) -> Vec<String> {
        match self.raw.get("sponsors") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// True if the package contributes any theme.
    pub fn declares_theme(&self) -> bool {
        self.section.theme || !self.section.themes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn themes_accepts_single_object() {
        let desc = PackageDescriptor::from_value(json!({
            "name": "pkg",
            "plugin": { "themes": { "name": "Dark", "url": "./dark.css", "mode": "dark" } }
        }))
        .unwrap();
        assert_eq!(desc.section().themes.len(), 1);
        assert!(desc.declares_theme());
    }

    #[test]
    fn set_declared_id_replaces_non_object_section() {
        let mut desc = PackageDescriptor::from_value(json!({ "name": "pkg", "plugin": null })).unwrap();
        desc.set_declared_id("abc");
        assert_eq!(desc.raw()["plugin"]["id"], "abc");
        assert_eq!(desc.declared_id(), Some("abc"));
    }
}
