use plughost_cli::check;
use plughost_core::{CoreConfig, PluginErrorKind};
use plughost_types::{ExecutionMode, LifecycleStatus};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

fn write_package(root: &Path, name: &str, descriptor: Value) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("package.json"), descriptor.to_string()).unwrap();
    fs::write(dir.join("index.html"), "<html></html>").unwrap();
    dir
}

#[tokio::test]
async fn reports_loaded_package() {
    let tmp = tempfile::tempdir().unwrap();
    let pkg = write_package(
        tmp.path(),
        "cal",
        json!({
            "name": "cal",
            "version": "1.2.0",
            "main": "index.html",
            "plugin": {
                "id": "cal",
                "mode": "shadow",
                "themes": { "name": "Dark", "url": "dark.css" }
            }
        }),
    );
    let config = CoreConfig::with_dot_root(tmp.path().join("dot"));

    let report = check(config, &[pkg.clone()]).await;

    assert!(report.is_clean());
    assert_eq!(report.plugins.len(), 1);
    let plugin = &report.plugins[0];
    assert_eq!(plugin.id, "cal");
    assert_eq!(plugin.status, LifecycleStatus::Loaded);
    assert_eq!(plugin.version.as_deref(), Some("1.2.0"));
    assert_eq!(plugin.mode, ExecutionMode::Direct);
    assert_eq!(plugin.themes, 1);
    assert!(!plugin.managed);
    assert_eq!(
        plugin.entry,
        Some(format!("file://{}", pkg.join("index.html").display()))
    );

    let prefs: Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("dot/preferences.json")).unwrap())
            .unwrap();
    assert_eq!(prefs["externals"], json!([pkg.display().to_string()]));
}

#[tokio::test]
async fn missing_package_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let config = CoreConfig::with_dot_root(tmp.path().join("dot"));

    let report = check(config, &[tmp.path().join("nothing-here")]).await;

    assert!(!report.is_clean());
    assert!(report.plugins.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].kind, PluginErrorKind::Package);

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["rejected"][0]["kind"], "package");
}

#[tokio::test]
async fn minted_identity_is_written_to_package() {
    let tmp = tempfile::tempdir().unwrap();
    let pkg = write_package(
        tmp.path(),
        "anon",
        json!({ "name": "anon", "main": "index.html", "keywords": ["x"] }),
    );
    let config = CoreConfig::with_dot_root(tmp.path().join("dot"));

    let report = check(config, &[pkg.clone()]).await;

    let id = &report.plugins[0].id;
    assert!(id.starts_with('_'));
    let written: Value =
        serde_json::from_str(&fs::read_to_string(pkg.join("package.json")).unwrap()).unwrap();
    assert_eq!(written["plugin"]["id"], json!(id));
    assert_eq!(written["keywords"], json!(["x"]));
}

#[tokio::test]
async fn duplicate_identity_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let descriptor = json!({ "name": "twin", "main": "index.html", "plugin": { "id": "twin" } });
    let first = write_package(tmp.path(), "a", descriptor.clone());
    let second = write_package(tmp.path(), "b", descriptor);
    let config = CoreConfig::with_dot_root(tmp.path().join("dot"));

    let report = check(config, &[first, second.clone()]).await;

    assert_eq!(report.plugins.len(), 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].kind, PluginErrorKind::DuplicateIdentity);
    assert_eq!(report.rejected[0].origin, second.display().to_string());
}
