//! Schema-driven default generation and value reconciliation.

use crate::SettingsError;
use crate::store::Settings;
use plughost_types::{DISABLED_KEY, SettingKind, SettingSchemaItem};
use serde_json::{Number, Value};
use std::collections::HashSet;

/// Rejects schemas that would clash with the store's invariants.
pub fn validate_schema(schema: &[SettingSchemaItem]) -> Result<(), SettingsError> {
    let mut seen = HashSet::new();
    for item in schema {
        if item.key.is_empty() {
            return Err(SettingsError::EmptyKey);
        }
        if item.key == DISABLED_KEY {
            return Err(SettingsError::ReservedKey(item.key.clone()));
        }
        if !seen.insert(item.key.as_str()) {
            return Err(SettingsError::DuplicateKey(item.key.clone()));
        }
    }
    Ok(())
}

/// Map of declared defaults. Headings and null defaults produce no entry.
pub fn defaults_from_schema(schema: &[SettingSchemaItem]) -> Settings {
    schema
        .iter()
        .filter(|item| item.carries_value() && !item.default.is_null())
        .map(|item| (item.key.clone(), item.default.clone()))
        .collect()
}

/// Reconciles `values` against `schema`: missing keys take their default,
/// present values are coerced to the declared kind, and values that cannot
/// be coerced fall back to the default. Undeclared keys pass through.
pub fn reconcile(values: &Settings, schema: &[SettingSchemaItem]) -> Settings {
    let mut out = values.clone();
    for item in schema.iter().filter(|i| i.carries_value()) {
        let current = values.get(&item.key).filter(|v| !v.is_null());
        let next = match current {
            Some(value) => coerce(item, value).unwrap_or_else(|| item.default.clone()),
            None => item.default.clone(),
        };
        if next.is_null() {
            out.remove(&item.key);
        } else {
            out.insert(item.key.clone(), next);
        }
    }
    out
}

fn coerce(item: &SettingSchemaItem, value: &Value) -> Option<Value> {
    match item.kind {
        SettingKind::String => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        SettingKind::Number => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => parse_number(s.trim()),
            _ => None,
        },
        SettingKind::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            _ => None,
        },
        SettingKind::Enum => coerce_enum(item, value),
        SettingKind::Object => value.is_object().then(|| value.clone()),
        SettingKind::Heading => None,
    }
}

fn coerce_enum(item: &SettingSchemaItem, value: &Value) -> Option<Value> {
    let allowed = |s: &str| item.enum_choices.is_empty() || item.enum_choices.iter().any(|c| c == s);
    if item.is_multi_choice() {
        let picked: Vec<Value> = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| allowed(s))
                .map(|s| Value::String(s.to_string()))
                .collect(),
            Value::String(s) if allowed(s) => vec![Value::String(s.clone())],
            _ => return None,
        };
        return Some(Value::Array(picked));
    }
    match value {
        Value::String(s) if allowed(s) => Some(value.clone()),
        _ => None,
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plughost_types::EnumPicker;
    use serde_json::json;

    fn map(v: Value) -> Settings {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_keys_take_defaults() {
        let schema = vec![
            SettingSchemaItem::new("size", SettingKind::Number, json!(12)),
            SettingSchemaItem::heading("h", "Heading"),
        ];
        let out = reconcile(&map(json!({ "disabled": false })), &schema);
        assert_eq!(out, map(json!({ "disabled": false, "size": 12 })));
    }

    #[test]
    fn coerces_strings_to_declared_kind() {
        let schema = vec![
            SettingSchemaItem::new("size", SettingKind::Number, json!(12)),
            SettingSchemaItem::new("ratio", SettingKind::Number, json!(1.0)),
            SettingSchemaItem::new("on", SettingKind::Boolean, json!(false)),
            SettingSchemaItem::new("label", SettingKind::String, json!("")),
        ];
        let out = reconcile(
            &map(json!({ "size": "14", "ratio": "0.5", "on": "TRUE", "label": 3 })),
            &schema,
        );
        assert_eq!(out["size"], json!(14));
        assert_eq!(out["ratio"], json!(0.5));
        assert_eq!(out["on"], json!(true));
        assert_eq!(out["label"], json!("3"));
    }

    #[test]
    fn invalid_values_fall_back_to_default() {
        let schema = vec![
            SettingSchemaItem::new("size", SettingKind::Number, json!(12)),
            SettingSchemaItem::new("pick", SettingKind::Enum, json!("a"))
                .with_choices(["a", "b"], EnumPicker::Select),
            SettingSchemaItem::new("obj", SettingKind::Object, json!({})),
        ];
        let out = reconcile(
            &map(json!({ "size": "large", "pick": "z", "obj": [1] })),
            &schema,
        );
        assert_eq!(out["size"], json!(12));
        assert_eq!(out["pick"], json!("a"));
        assert_eq!(out["obj"], json!({}));
    }

    #[test]
    fn multi_choice_filters_unknown() {
        let schema = vec![SettingSchemaItem::new("tags", SettingKind::Enum, json!([]))
            .with_choices(["a", "b"], EnumPicker::Checkbox)];
        let out = reconcile(&map(json!({ "tags": ["a", "x", "b"] })), &schema);
        assert_eq!(out["tags"], json!(["a", "b"]));
    }

    #[test]
    fn undeclared_keys_pass_through() {
        let out = reconcile(&map(json!({ "extra": 1 })), &[]);
        assert_eq!(out["extra"], json!(1));
    }

    #[test]
    fn validate_rejects_reserved_and_duplicates() {
        let reserved = vec![SettingSchemaItem::new("disabled", SettingKind::Boolean, json!(false))];
        assert_eq!(
            validate_schema(&reserved),
            Err(SettingsError::ReservedKey("disabled".into()))
        );
        let dup = vec![
            SettingSchemaItem::new("a", SettingKind::String, json!("")),
            SettingSchemaItem::new("a", SettingKind::Number, json!(0)),
        ];
        assert_eq!(validate_schema(&dup), Err(SettingsError::DuplicateKey("a".into())));
        let empty = vec![SettingSchemaItem::new("", SettingKind::String, json!(""))];
        assert_eq!(validate_schema(&empty), Err(SettingsError::EmptyKey));
    }
}
