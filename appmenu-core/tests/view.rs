use appmenu_core::config::AppletConfig;
use appmenu_core::focus::FocusTarget;
use appmenu_core::grab::{CoordinatorId, InputGrab};
use appmenu_core::manager::{CapturedEvent, EventDisposition};
use appmenu_core::model::{ItemProperties, MenuKind, MenuTree, NodeId};
use appmenu_core::popup::keyboard::Key;
use appmenu_core::popup::{MenuId, PopupState};
use appmenu_core::source::ItemEvent;
use appmenu_core::time::ManualClock;
use appmenu_core::view::{MenuView, ViewAction};
use appmenu_core::widget::WidgetId;

const ROOT: NodeId = NodeId(0);
const FILE: NodeId = NodeId(1);
const OPEN: NodeId = NodeId(2);
const EDIT: NodeId = NodeId(3);
const COPY: NodeId = NodeId(4);
const EMPTY: NodeId = NodeId(5);

fn tree() -> MenuTree {
    let mut tree = MenuTree::new(ROOT);
    tree.insert(FILE, ItemProperties::labeled(MenuKind::SubMenu, "File"));
    tree.insert(OPEN, ItemProperties::labeled(MenuKind::Item, "Open"));
    tree.insert(EDIT, ItemProperties::labeled(MenuKind::SubMenu, "Edit"));
    tree.insert(COPY, ItemProperties::labeled(MenuKind::Item, "Copy"));
    tree.insert(EMPTY, ItemProperties::labeled(MenuKind::SubMenu, "Recent"));
    tree.add_child(ROOT, 0, FILE).unwrap();
    tree.add_child(ROOT, 1, EDIT).unwrap();
    tree.add_child(ROOT, 2, EMPTY).unwrap();
    tree.add_child(FILE, 0, OPEN).unwrap();
    tree.add_child(EDIT, 0, COPY).unwrap();
    tree.flush();
    tree
}

struct Fixture {
    tree: MenuTree,
    view: MenuView,
    grab: InputGrab,
    clock: ManualClock,
}

fn fixture(config: AppletConfig) -> Fixture {
    let tree = tree();
    let grab = InputGrab::new();
    let clock = ManualClock::new();
    let view = MenuView::new(&tree, &config, grab.clone(), CoordinatorId(1), Box::new(clock.clone()));
    Fixture { tree, view, grab, clock }
}

fn hover_config() -> AppletConfig {
    AppletConfig {
        open_on_hover: true,
        close_active_submenu: true,
        ..AppletConfig::default()
    }
}

fn widget(view: &MenuView, node: NodeId) -> WidgetId {
    view.binder().widget_for(node).map(|widget| widget.id()).unwrap()
}

fn menu(view: &MenuView, node: NodeId) -> MenuId {
    view.binder().widget_for(node).and_then(|widget| widget.menu).unwrap()
}

#[test]
fn test_top_level_is_built_eagerly_and_the_rest_lazily() {
    let mut fx = fixture(AppletConfig::default());
    let file = widget(&fx.view, FILE);
    assert!(!fx.view.binder().widget(file).unwrap().is_populated());
    assert!(fx.view.binder().widget_for(OPEN).is_none());

    while fx.view.run_idle(&fx.tree, 1) > 0 {}
    assert!(fx.view.binder().widget_for(OPEN).is_some());
    assert_eq!(fx.view.binder().len(), fx.tree.len());
    assert_eq!(fx.view.manager().len(), 4);
}

#[test]
fn test_empty_submenu_opens_and_closes_cleanly() {
    let mut fx = fixture(AppletConfig::default());
    let recent = menu(&fx.view, EMPTY);

    assert!(fx.view.open_menu(&fx.tree, widget(&fx.view, EMPTY)));
    assert_eq!(fx.view.arena().state(recent), PopupState::Open);
    assert_eq!(fx.grab.owner(), Some(CoordinatorId(1)));

    assert!(fx.view.close_menu(recent, false));
    assert_eq!(fx.view.arena().state(recent), PopupState::Closed);
    assert_eq!(fx.grab.owner(), None);
    assert!(fx.view.manager().chain().is_empty());
}

#[test]
fn test_hover_switches_between_sibling_chains() {
    let mut fx = fixture(hover_config());
    let root = fx.view.root_menu().unwrap();
    let file = menu(&fx.view, FILE);
    let edit = menu(&fx.view, EDIT);

    assert!(fx.view.forced_toggle(&fx.tree));
    assert_eq!(fx.view.manager().chain(), &[root]);

    fx.view.hover(&fx.tree, Some(widget(&fx.view, FILE)));
    assert!(fx.view.arena().is_open(file));
    assert_eq!(fx.view.manager().chain(), &[root, file]);

    fx.view.hover(&fx.tree, Some(widget(&fx.view, EDIT)));
    assert!(!fx.view.arena().is_open(file));
    assert!(fx.view.arena().is_open(edit));
    assert_eq!(fx.view.manager().chain(), &[root, edit]);
    assert!(fx.view.manager().is_grabbed());

    let actions = fx.view.take_actions();
    assert!(actions.contains(&ViewAction::AboutToShow(FILE)));
    assert!(actions.contains(&ViewAction::Dispatch(FILE, ItemEvent::Opened)));
    assert!(actions.contains(&ViewAction::Dispatch(FILE, ItemEvent::Closed)));
    let about = actions.iter().position(|action| *action == ViewAction::AboutToShow(EDIT));
    let opened = actions
        .iter()
        .position(|action| *action == ViewAction::Dispatch(EDIT, ItemEvent::Opened));
    assert!(about.is_some() && about < opened);

    // Waiting after leaving the launcher for the open popup keeps it open.
    fx.view.hover(&fx.tree, None);
    fx.view.pointer_over_menu(Some(edit));
    fx.clock.advance(std::time::Duration::from_millis(100));
    fx.view.tick();
    assert!(fx.view.arena().is_open(edit));
}

#[test]
fn test_hover_without_close_policy_only_highlights() {
    let mut fx = fixture(AppletConfig {
        open_on_hover: true,
        ..AppletConfig::default()
    });
    let file = menu(&fx.view, FILE);
    let edit = menu(&fx.view, EDIT);
    fx.view.forced_toggle(&fx.tree);

    fx.view.hover(&fx.tree, Some(widget(&fx.view, FILE)));
    assert!(fx.view.arena().is_open(file));
    fx.view.hover(&fx.tree, Some(widget(&fx.view, EDIT)));
    assert!(fx.view.arena().is_open(file));
    assert!(!fx.view.arena().is_open(edit));
    assert!(fx.view.binder().widget(widget(&fx.view, EDIT)).unwrap().is_active());
}

#[test]
fn test_keyboard_navigation() {
    let mut fx = fixture(AppletConfig::default());
    let root = fx.view.root_menu().unwrap();
    let file = menu(&fx.view, FILE);
    fx.view.forced_toggle(&fx.tree);
    fx.view.set_focus(Some(FocusTarget::Launcher));

    assert!(fx.view.key_press(&fx.tree, Key::Down));
    assert_eq!(fx.view.focus(), Some(FocusTarget::Widget(widget(&fx.view, FILE))));
    assert!(fx.view.key_press(&fx.tree, Key::Up));
    assert_eq!(fx.view.focus(), Some(FocusTarget::Widget(widget(&fx.view, EMPTY))));
    assert!(fx.view.key_press(&fx.tree, Key::Down));

    assert!(fx.view.key_press(&fx.tree, Key::Right));
    assert!(fx.view.arena().is_open(file));
    assert_eq!(fx.view.focus(), Some(FocusTarget::Widget(widget(&fx.view, OPEN))));

    assert!(fx.view.key_press(&fx.tree, Key::Left));
    assert!(!fx.view.arena().is_open(file));
    assert_eq!(fx.view.focus(), Some(FocusTarget::Widget(widget(&fx.view, FILE))));

    assert!(fx.view.key_press(&fx.tree, Key::Escape));
    assert!(!fx.view.arena().is_open(root));
    assert_eq!(fx.view.focus(), Some(FocusTarget::Launcher));
    assert_eq!(fx.grab.owner(), None);
}

#[test]
fn test_activation_reports_click_and_closes_everything() {
    let mut fx = fixture(AppletConfig::default());
    let root = fx.view.root_menu().unwrap();
    fx.view.forced_toggle(&fx.tree);
    fx.view.open_menu(&fx.tree, widget(&fx.view, FILE));
    fx.view.take_actions();

    fx.view.set_focus(Some(FocusTarget::Widget(widget(&fx.view, OPEN))));
    assert!(fx.view.key_press(&fx.tree, Key::Return));

    assert_eq!(
        fx.view.take_actions(),
        vec![
            ViewAction::Dispatch(OPEN, ItemEvent::Clicked),
            ViewAction::Dispatch(FILE, ItemEvent::Closed),
        ]
    );
    assert!(!fx.view.arena().is_open(root));
    assert_eq!(fx.grab.owner(), None);
}

#[test]
fn test_outside_click_closes_chain() {
    let mut fx = fixture(AppletConfig::default());
    let root = fx.view.root_menu().unwrap();
    fx.view.forced_toggle(&fx.tree);

    assert_eq!(
        fx.view.capture_event(CapturedEvent::ButtonPress, Some(root)),
        EventDisposition::Deliver
    );
    assert_eq!(fx.view.capture_event(CapturedEvent::Motion, None), EventDisposition::Block);
    assert_eq!(
        fx.view.capture_event(CapturedEvent::ButtonPress, None),
        EventDisposition::Propagate
    );
    assert!(!fx.view.arena().is_open(root));
}

#[test]
fn test_model_changes_reach_the_widgets() {
    let mut fx = fixture(AppletConfig::default());
    let file = menu(&fx.view, FILE);
    fx.view.open_menu(&fx.tree, widget(&fx.view, FILE));

    fx.tree.insert(NodeId(10), ItemProperties::labeled(MenuKind::Item, "Save"));
    fx.tree.add_child(FILE, 0, NodeId(10)).unwrap();
    fx.tree.set_label(OPEN, "Open...");
    fx.tree.move_child(FILE, OPEN, 0).unwrap();
    fx.tree.flush();
    fx.view.sync(&fx.tree);

    let file_widget = widget(&fx.view, FILE);
    let order: Vec<NodeId> = fx
        .view
        .binder()
        .children(file_widget)
        .iter()
        .filter_map(|id| fx.view.binder().widget(*id))
        .map(|widget| widget.node())
        .collect();
    assert_eq!(order, fx.tree.children(FILE).to_vec());
    assert_eq!(order, vec![OPEN, NodeId(10)]);
    let label = fx.view.binder().widget_for(OPEN).and_then(|widget| widget.label.clone());
    assert_eq!(label.as_deref(), Some("Open..."));

    fx.tree.remove_child(FILE, OPEN).unwrap();
    fx.tree.remove_child(FILE, NodeId(10)).unwrap();
    fx.tree.flush();
    fx.view.sync(&fx.tree);
    assert!(fx.view.binder().widget_for(OPEN).is_none());
    assert!(!fx.view.arena().is_open(file));
}

#[test]
fn test_destroyed_submenu_releases_its_popup() {
    let mut fx = fixture(AppletConfig::default());
    let edit = menu(&fx.view, EDIT);
    fx.view.open_menu(&fx.tree, widget(&fx.view, EDIT));
    assert!(fx.view.manager().is_grabbed());

    fx.tree.destroy(EDIT);
    fx.tree.flush();
    fx.view.sync(&fx.tree);

    assert!(!fx.view.arena().contains(edit));
    assert!(!fx.view.manager().contains(edit));
    assert!(!fx.view.manager().is_grabbed());
}

#[test]
fn test_docked_root_navigates_sideways() {
    let mut fx = fixture(AppletConfig {
        display_in_panel: true,
        open_on_hover: true,
        ..AppletConfig::default()
    });
    let root = fx.view.root_menu().unwrap();
    let file = menu(&fx.view, FILE);
    let edit = menu(&fx.view, EDIT);

    assert!(fx.view.open_root(&fx.tree, false));
    assert!(fx.view.arena().is_open(root));
    assert!(fx.view.manager().chain().is_empty());
    assert!(!fx.view.close_menu(root, false));

    fx.view.hover(&fx.tree, Some(widget(&fx.view, FILE)));
    assert!(fx.view.arena().is_open(file));

    assert!(fx.view.key_press(&fx.tree, Key::Right));
    assert!(!fx.view.arena().is_open(file));
    assert!(fx.view.arena().is_open(edit));
    assert_eq!(fx.view.focus(), Some(FocusTarget::Widget(widget(&fx.view, COPY))));
    assert!(fx.view.arena().is_open(root));

    assert!(fx.view.forced_toggle(&fx.tree));
    assert!(!fx.view.arena().is_open(root));
}
