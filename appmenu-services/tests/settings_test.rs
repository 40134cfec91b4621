use appmenu_core::popup::Effect;
use appmenu_services::SettingsRegistry;
use std::fs;

#[tokio::test]
async fn test_later_files_override_earlier_ones() {
    let dir = tempfile::tempdir().unwrap();
    let system = dir.path().join("system.toml");
    let user = dir.path().join("user.toml");
    fs::write(
        &system,
        r#"
        [general]
        log_level = "debug"

        [applet]
        display-in-panel = true
        max-app-name-size = 20
        effect = "hideHorizontal"
        "#,
    )
    .unwrap();
    fs::write(
        &user,
        r#"
        [applet]
        display-in-panel = false
        effect-time = 0.25
        "#,
    )
    .unwrap();

    let mut registry = SettingsRegistry::with_defaults();
    let results = registry.load_from_paths_async(vec![system, user]).await;
    assert!(results.iter().all(|result| result.is_ok()));

    let config = registry.applet_config();
    assert!(!config.display_in_panel);
    assert!(config.floating_root());
    assert_eq!(config.max_app_name_size, 20);
    assert_eq!(config.effect, Effect::HideHorizontal);
    assert_eq!(config.effect_time, 0.25);
    assert_eq!(registry.log_level(), Some("debug"));
}

#[tokio::test]
async fn test_broken_files_are_reported_and_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("broken.toml");
    let good = dir.path().join("good.toml");
    fs::write(&broken, "[applet\nshow-app-name = ").unwrap();
    fs::write(&good, "[applet]\nshow-app-name = false\n").unwrap();
    let missing = dir.path().join("missing.toml");

    let mut registry = SettingsRegistry::with_defaults();
    let results = registry.load_from_paths_async(vec![broken, missing, good]).await;
    assert!(results[0].is_err());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
    assert!(!registry.applet_config().show_app_name);
}
