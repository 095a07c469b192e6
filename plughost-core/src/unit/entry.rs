//! Entry-point helpers: validation, url resolution and the host document
//! synthesized for script entries.

use plughost_types::PluginId;
use std::path::{Path, PathBuf};

fn path_part(location: &str) -> &str {
    location
        .split(['?', '#'])
        .next()
        .unwrap_or(location)
}

/// Entries must point at a script or an HTML document.
pub fn is_valid_entry(location: &str) -> bool {
    let path = path_part(location);
    path.ends_with(".js") || path.ends_with(".html")
}

pub fn is_script_entry(location: &str) -> bool {
    path_part(location).ends_with(".js")
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Resolves a package-relative location against the package root. Remote
/// and `file://` locations are kept as they are.
pub fn resolve_url(root: &Path, location: &str) -> String {
    if is_remote(location) || location.starts_with("file://") {
        return location.to_string();
    }
    let relative = location.trim_start_matches("./");
    let path = if Path::new(relative).is_absolute() {
        PathBuf::from(relative)
    } else {
        root.join(relative)
    };
    format!("file://{}", path.display())
}

/// File name of the synthesized document for a plugin.
pub fn document_name(plugin_id: &PluginId) -> String {
    format!("{plugin_id}.html")
}

/// HTML document that boots the plugin runtime and then the entry script.
pub fn host_document(title: &str, runtime_script: &str, entry: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>{title}</title>
  <script src="{runtime}"></script>
</head>
<body>
  <div id="app"></div>
  <script src="{entry}"></script>
</body>
</html>
"#,
        title = escape_html(title),
        runtime = escape_html(runtime_script),
        entry = escape_html(entry),
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_validation_ignores_query() {
        assert!(is_valid_entry("dist/index.html"));
        assert!(is_valid_entry("https://cdn.example.com/main.js?v=3"));
        assert!(!is_valid_entry("src/main.ts"));
        assert!(is_script_entry("file:///p/index.js#x"));
        assert!(!is_script_entry("index.html"));
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let root = Path::new("/plugins/cal");
        assert_eq!(resolve_url(root, "./dist/index.html"), "file:///plugins/cal/dist/index.html");
        assert_eq!(resolve_url(root, "icon.png"), "file:///plugins/cal/icon.png");
        assert_eq!(resolve_url(root, "https://x.dev/a.js"), "https://x.dev/a.js");
        assert_eq!(resolve_url(root, "file:///elsewhere/a.js"), "file:///elsewhere/a.js");
        assert_eq!(resolve_url(root, "/abs/a.js"), "file:///abs/a.js");
    }

    #[test]
    fn document_embeds_runtime_then_entry() {
        let doc = host_document("Cal <dev>", "runtime.js", "file:///p/index.js");
        let runtime_at = doc.find("runtime.js").unwrap();
        let entry_at = doc.find("file:///p/index.js").unwrap();
        assert!(runtime_at < entry_at);
        assert!(doc.contains("Cal &lt;dev&gt;"));
    }
}
