//! Application hook naming and delivery capability.

/// Namespace of application-level hooks.
pub const HOOK_APP: &str = "hook:app";
/// Namespace of editor hooks.
pub const HOOK_EDITOR: &str = "hook:editor";
/// Namespace of database hooks.
pub const HOOK_DB: &str = "hook:db";

/// How a unit is gated for broadcast hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookCapability {
    /// No runtime version reported: receives everything except the
    /// configured suppressed hooks.
    Legacy,
    /// Runtime version reported: the host decides per hook.
    VersionAware,
}

/// Full hook name, `namespace:snake_kind`.
pub fn hook_name(ns: &str, kind: &str) -> String {
    format!("{ns}:{}", snake_case(kind))
}

/// `routeChanged`, `route-changed` and `Route Changed` all become
/// `route_changed`.
pub fn snake_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_lower = false;
    for ch in input.chars() {
        if ch == '-' || ch == ' ' || ch == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out.trim_end_matches('_').to_string()
}
