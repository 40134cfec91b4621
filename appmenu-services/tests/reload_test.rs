use appmenu_services::SettingsRegistry;
use std::fs;
use std::path::Path;

fn point_xdg_at(root: &Path) -> std::path::PathBuf {
    let config_home = root.join("config");
    fs::create_dir_all(config_home.join("appmenu")).unwrap();
    std::env::set_var("XDG_CONFIG_HOME", &config_home);
    std::env::set_var("XDG_CONFIG_DIRS", root.join("etc"));
    std::env::set_var("XDG_DATA_DIRS", root.join("share"));
    config_home.join("appmenu").join("config.toml")
}

#[tokio::test]
async fn test_reload_rereads_the_user_file() {
    let dir = tempfile::tempdir().unwrap();
    let user = point_xdg_at(dir.path());
    fs::write(&user, "[applet]\nmax-app-name-size = 4\n").unwrap();

    let mut registry = SettingsRegistry::new().await.unwrap();
    assert_eq!(registry.applet_config().max_app_name_size, 4);

    // Keys merged from elsewhere do not survive a reload.
    let extra = dir.path().join("extra.toml");
    fs::write(&extra, "[applet]\ndisplay-in-panel = true\n").unwrap();
    let results = registry.load_from_paths_async(vec![extra]).await;
    assert!(results.iter().all(|result| result.is_ok()));
    assert!(registry.applet_config().display_in_panel);

    fs::write(&user, "[applet]\nmax-app-name-size = 9\n").unwrap();
    registry.reload_async().await.unwrap();

    let config = registry.applet_config();
    assert_eq!(config.max_app_name_size, 9);
    assert!(!config.display_in_panel);
}
