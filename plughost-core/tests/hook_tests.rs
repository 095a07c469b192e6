mod common;

use common::{Harness, settle};
use plughost_core::SandboxRequest;
use plughost_core::mock::{options, package};
use pretty_assertions::assert_eq;
use serde_json::json;

async fn two_plugins() -> Harness {
    let h = Harness::new();
    h.host.add_package("/ext/modern", package("modern"));
    h.host.add_package("/ext/legacy", package("legacy"));
    h.orchestrator
        .register([options("/ext/modern"), options("/ext/legacy")], false)
        .await;
    settle().await;
    h.orchestrator
        .plugin("modern")
        .unwrap()
        .handle_request(SandboxRequest::SdkMetadata {
            version: "2.1.0".into(),
        })
        .await;
    h
}

#[tokio::test]
async fn broadcast_follows_capability_rules() {
    let h = two_plugins().await;
    h.host.deny_hook("modern", "hook:app:route_changed");

    h.orchestrator
        .hook_app("routeChanged", json!({ "path": "/notes" }), None)
        .await;
    h.orchestrator.hook_db("changed", json!({}), None).await;
    h.orchestrator.hook_db("blockUpdated", json!({}), None).await;

    let modern = h.sandboxes.channel("modern").unwrap();
    let legacy = h.sandboxes.channel("legacy").unwrap();
    assert_eq!(
        modern.hook_names(),
        vec!["hook:db:changed", "hook:db:block_updated"]
    );
    assert_eq!(legacy.hook_names(), vec!["hook:app:route_changed"]);

    let checks: Vec<String> = h.host.hook_checks().into_iter().map(|(_, name)| name).collect();
    assert_eq!(
        checks,
        vec![
            "hook:app:route_changed",
            "hook:db:changed",
            "hook:db:block_updated"
        ]
    );
}

#[tokio::test]
async fn targeted_hook_skips_gating() {
    let h = two_plugins().await;

    h.orchestrator
        .hook_db("changed", json!({ "id": 1 }), Some("legacy"))
        .await;

    let legacy = h.sandboxes.channel("legacy").unwrap();
    assert_eq!(legacy.hook_names(), vec!["hook:db:changed"]);
    assert!(h.sandboxes.channel("modern").unwrap().hook_names().is_empty());
    assert!(h.host.hook_checks().is_empty());
}

#[tokio::test]
async fn disabled_plugins_receive_nothing() {
    let h = two_plugins().await;
    h.orchestrator.disable("legacy").await.unwrap();

    h.orchestrator
        .hook_editor("selectionChanged", json!(null), None)
        .await;

    assert!(h.sandboxes.channel("legacy").unwrap().hook_names().is_empty());
    assert_eq!(
        h.sandboxes.channel("modern").unwrap().hook_names(),
        vec!["hook:editor:selection_changed"]
    );
}

#[tokio::test]
async fn inactive_target_falls_back_to_broadcast() {
    let h = two_plugins().await;
    h.orchestrator.disable("legacy").await.unwrap();

    h.orchestrator
        .hook_app("routeChanged", json!({}), Some("legacy"))
        .await;
    h.orchestrator
        .hook_app("routeChanged", json!({}), Some("nobody"))
        .await;

    assert!(h.sandboxes.channel("legacy").unwrap().hook_names().is_empty());
    assert_eq!(
        h.sandboxes.channel("modern").unwrap().hook_names(),
        vec!["hook:app:route_changed", "hook:app:route_changed"]
    );
    assert_eq!(h.host.hook_checks().len(), 2);
}

#[tokio::test]
async fn hook_payload_carries_namespace_and_kind() {
    let h = two_plugins().await;

    h.orchestrator
        .hook("hook:app", "theme-changed", json!({ "mode": "dark" }), Some("modern"))
        .await;

    let messages = h.sandboxes.channel("modern").unwrap().messages();
    let hook = serde_json::to_value(messages.last().unwrap()).unwrap();
    assert_eq!(
        hook,
        json!({
            "type": "hook",
            "name": "hook:app:theme_changed",
            "ns": "hook:app",
            "kind": "theme_changed",
            "payload": { "mode": "dark" }
        })
    );
}
