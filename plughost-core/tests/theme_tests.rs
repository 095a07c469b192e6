mod common;

use common::{Harness, drain, kinds};
use plughost_core::mock::{options, package};
use plughost_core::{CoreEvent, SelectThemeOptions};
use plughost_types::{ThemeDescriptor, ThemeMode, UserPreferences};
use pretty_assertions::assert_eq;
use serde_json::json;

const SKIN_CSS: &str = "file:///ext/skin/dark.css";

async fn with_skin() -> Harness {
    let h = Harness::new();
    let mut descriptor = package("skin");
    descriptor["plugin"]["themes"] = json!([
        { "name": "Midnight", "url": "./dark.css", "mode": "dark" },
        { "name": "Paper", "url": "light.css", "mode": "light" }
    ]);
    h.host.add_package("/ext/skin", descriptor);
    h.orchestrator.register([options("/ext/skin")], false).await;
    h
}

#[tokio::test]
async fn package_themes_register_with_one_release() {
    let h = with_skin().await;

    let themes = h.orchestrator.themes();
    assert_eq!(themes.len(), 2);
    assert_eq!(themes[0].url.as_deref(), Some(SKIN_CSS));
    assert!(themes.iter().all(|t| t.is_owned_by(&"skin".into())));

    let unit = h.orchestrator.plugin("skin").unwrap();
    assert_eq!(unit.disposal_labels(), vec!["themes", "sandbox"]);
}

#[tokio::test]
async fn select_persists_per_mode_and_replaces_previous() {
    let h = with_skin().await;
    let themes = h.orchestrator.themes();
    let mut rx = h.events();

    h.orchestrator
        .select_theme(themes[0].clone(), SelectThemeOptions::default())
        .await
        .unwrap();
    h.orchestrator
        .select_theme(themes[1].clone(), SelectThemeOptions::default())
        .await
        .unwrap();

    assert_eq!(
        h.presentation.injected_themes(),
        vec!["file:///ext/skin/light.css"]
    );
    let prefs = h.host.preferences().unwrap();
    assert_eq!(prefs.themes.dark.as_ref().unwrap().name, "Midnight");
    assert_eq!(prefs.themes.light.as_ref().unwrap().name, "Paper");
    assert_eq!(kinds(&drain(&mut rx)), vec!["theme-selected", "theme-selected"]);
}

#[tokio::test]
async fn quiet_select_neither_persists_nor_emits() {
    let h = with_skin().await;
    let saves = h.host.preference_saves();
    let mut rx = h.events();

    h.orchestrator
        .select_theme(h.orchestrator.themes()[0].clone(), SelectThemeOptions::QUIET)
        .await
        .unwrap();

    assert_eq!(h.presentation.injected_themes(), vec![SKIN_CSS]);
    assert_eq!(h.host.preference_saves(), saves);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn reload_keeps_the_selected_theme() {
    let h = with_skin().await;
    let midnight = h.orchestrator.themes()[0].clone();
    h.orchestrator
        .select_theme(midnight, SelectThemeOptions::default())
        .await
        .unwrap();
    let mut rx = h.events();

    h.orchestrator.reload(["skin"]).await.unwrap();

    assert_eq!(h.presentation.injected_themes(), vec![SKIN_CSS]);
    assert!(h.host.preferences().unwrap().themes.dark.is_some());
    assert_eq!(h.orchestrator.themes().len(), 2);
    let events = kinds(&drain(&mut rx));
    assert!(!events.contains(&"reset-custom-theme"));
}

#[tokio::test]
async fn unregistering_owner_resets_custom_theme() {
    let h = with_skin().await;
    let midnight = h.orchestrator.themes()[0].clone();
    h.orchestrator
        .select_theme(midnight, SelectThemeOptions::default())
        .await
        .unwrap();
    let mut rx = h.events();

    h.orchestrator.unregister(["skin"]).await.unwrap();

    assert!(h.presentation.injected_themes().is_empty());
    assert!(h.orchestrator.themes().is_empty());
    let prefs = h.host.preferences().unwrap();
    assert_eq!(prefs.themes.dark, None);
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, CoreEvent::ResetCustomTheme(s) if s.dark.is_none())));
}

#[tokio::test]
async fn unregistering_non_owner_leaves_selection() {
    let h = with_skin().await;
    let other = ThemeDescriptor::new("Solar", "file:///themes/solar.css").owned_by("someone");
    h.orchestrator
        .select_theme(other, SelectThemeOptions::default())
        .await
        .unwrap();

    h.orchestrator.unregister_theme(&"skin".into(), true).await;

    assert_eq!(
        h.presentation.injected_themes(),
        vec!["file:///themes/solar.css"]
    );
    assert!(h.host.preferences().unwrap().theme.is_some());
}

#[tokio::test]
async fn unregistering_owner_without_contributions_still_resets() {
    let h = Harness::new();
    let ghost = ThemeDescriptor::new("Ghost", "file:///themes/ghost.css").owned_by("ghost");
    h.orchestrator
        .select_theme(ghost, SelectThemeOptions::default())
        .await
        .unwrap();
    let mut rx = h.events();

    h.orchestrator.unregister_theme(&"ghost".into(), true).await;

    assert!(h.presentation.injected_themes().is_empty());
    assert_eq!(h.host.preferences().unwrap().theme, None);
    assert_eq!(
        kinds(&drain(&mut rx)),
        vec!["themes-changed", "reset-custom-theme"]
    );
}

#[tokio::test]
async fn registration_activates_preferred_theme_quietly() {
    let h = Harness::new();
    let saved = ThemeDescriptor::new("Solar", "file:///themes/solar.css").with_mode(ThemeMode::Dark);
    let mut prefs = UserPreferences::default();
    prefs.themes.mode = ThemeMode::Dark;
    prefs.themes.dark = Some(saved);
    h.host.set_preferences(prefs);
    let mut rx = h.events();

    h.orchestrator.register(Vec::new(), false).await;

    assert_eq!(
        h.presentation.injected_themes(),
        vec!["file:///themes/solar.css"]
    );
    assert_eq!(kinds(&drain(&mut rx)), vec!["ready"]);
}

#[tokio::test]
async fn switching_mode_falls_back_to_builtin() {
    let h = with_skin().await;
    h.orchestrator
        .select_theme(h.orchestrator.themes()[0].clone(), SelectThemeOptions::default())
        .await
        .unwrap();
    let mut rx = h.events();

    h.orchestrator.set_theme_mode(ThemeMode::Light).await.unwrap();

    assert!(h.presentation.injected_themes().is_empty());
    assert_eq!(h.host.preferences().unwrap().themes.mode, ThemeMode::Light);
    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![CoreEvent::ThemeSelected(ThemeDescriptor::builtin(Some(
            ThemeMode::Light
        )))]
    );

    h.orchestrator.set_theme_mode(ThemeMode::Dark).await.unwrap();
    assert_eq!(h.presentation.injected_themes(), vec![SKIN_CSS]);
}
