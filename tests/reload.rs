use appmenu::applet::AppletShell;
use appmenu_core::model::{ItemProperties, MenuKind, NodeId};
use appmenu_core::registry::{WindowId, WindowRegistry};
use appmenu_core::resolver::MenuLocator;
use appmenu_core::testing::{ManualResolver, ScriptedSource, StaticTracker};
use appmenu_core::time::ManualClock;
use appmenu_services::SettingsRegistry;
use std::fs;

#[test]
fn test_reloaded_settings_reach_the_shell() {
    let dir = tempfile::tempdir().unwrap();
    let config_home = dir.path().join("config");
    fs::create_dir_all(config_home.join("appmenu")).unwrap();
    std::env::set_var("XDG_CONFIG_HOME", &config_home);
    std::env::set_var("XDG_CONFIG_DIRS", dir.path().join("etc"));
    std::env::set_var("XDG_DATA_DIRS", dir.path().join("share"));
    let user = config_home.join("appmenu").join("config.toml");
    fs::write(&user, "[applet]\nautomatic-active-mainmenu = false\nmax-app-name-size = 4\n").unwrap();

    smol::block_on(async {
        let mut settings = SettingsRegistry::new().await.unwrap();
        let resolver = ManualResolver::new();
        let tracker = StaticTracker::new();
        let registry = WindowRegistry::new(Box::new(tracker.clone()), Box::new(resolver.clone()), 22);
        let mut shell = AppletShell::new(registry, settings.applet_config(), ManualClock::new());

        let window = WindowId(5);
        tracker.add_app_window(window, "gedit", Some("gedit"));
        tracker.set_focused(Some(window));
        shell.registry_mut().register(window, MenuLocator::dbusmenu(":1.1", "/menu"));
        let (source, script) = ScriptedSource::new(NodeId(0), "gedit");
        script.add_child(NodeId(0), 0, NodeId(1), ItemProperties::labeled(MenuKind::SubMenu, "File"));
        resolver.complete(window, source);
        shell.dispatch();
        assert_eq!(shell.button().label, "gedi");

        shell.button_press(1);
        let root = shell.view().and_then(|view| view.root_menu()).unwrap();
        assert!(shell.view().unwrap().arena().is_open(root));

        fs::write(&user, "[applet]\nmax-app-name-size = 3\n").unwrap();
        shell.reload_settings(&mut settings).await.unwrap();

        assert_eq!(shell.config().max_app_name_size, 3);
        assert!(shell.config().automatic_active_mainmenu);
        assert_eq!(shell.button().label, "ged");
        assert!(!shell.view().unwrap().arena().is_open(root));
    });
}
