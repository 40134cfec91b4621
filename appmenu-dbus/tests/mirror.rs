use appmenu_core::model::{MenuKind, NodeId};
use appmenu_core::source::{AppMenu, ItemEvent, RemoteMenuSource};
use appmenu_dbus::client::{self, ClientRequest};
use appmenu_dbus::gtk::{GtkEntry, GtkMirror};
use appmenu_dbus::mirror::{LayoutMirror, LayoutNode};
use appmenu_dbus::properties::DecodedItem;

fn labels(menu: &AppMenu, parent: NodeId) -> Vec<String> {
    menu.tree()
        .children(parent)
        .iter()
        .filter_map(|id| menu.tree().node(*id))
        .map(|node| node.properties().label.clone())
        .collect()
}

fn file_menu(items: &[(i32, &str)]) -> LayoutNode {
    LayoutNode::new(0, DecodedItem::default()).with_children(vec![LayoutNode::new(1, DecodedItem::submenu("File"))
        .with_children(
            items
                .iter()
                .map(|(id, label)| LayoutNode::new(*id, DecodedItem::labeled(*label)))
                .collect(),
        )])
}

#[test]
fn test_dbusmenu_layouts_reach_the_model() {
    let mut mirror = LayoutMirror::new(NodeId(0));
    let (source, channels) = client::channel(NodeId(0), ":1.5/MenuBar");

    channels.send_all(mirror.apply_layout(file_menu(&[(10, "New"), (11, "Open"), (12, "Quit")])));
    let mut menu = AppMenu::new(Box::new(source));
    assert_eq!(labels(&menu, NodeId(0)), vec!["File"]);
    assert_eq!(labels(&menu, NodeId(1)), vec!["New", "Open", "Quit"]);
    assert_eq!(menu.tree().node(NodeId(1)).map(|node| node.kind()), Some(MenuKind::SubMenu));

    channels.send_all(mirror.apply_layout(file_menu(&[(12, "Quit"), (10, "New")])));
    let outcome = menu.pump();
    assert!(!outcome.collapsed);
    assert_eq!(labels(&menu, NodeId(1)), vec!["Quit", "New"]);
    assert!(!menu.tree().contains(NodeId(11)));
}

#[test]
fn test_emptied_dbusmenu_collapses() {
    let mut mirror = LayoutMirror::new(NodeId(0));
    let (source, channels) = client::channel(NodeId(0), "test");
    channels.send_all(mirror.apply_layout(file_menu(&[(10, "New")])));
    let mut menu = AppMenu::new(Box::new(source));

    channels.send_all(mirror.apply_layout(LayoutNode::new(0, DecodedItem::default())));
    assert!(menu.pump().collapsed);
    assert!(menu.tree().children(NodeId(0)).is_empty());
}

#[test]
fn test_gtk_sections_reach_the_model() {
    let mut mirror = GtkMirror::new();
    let (source, channels) = client::channel(NodeId(0), "gtk");
    channels.send_all(mirror.load([
        ((0, 0), vec![GtkEntry::submenu("Edit", (0, 1))]),
        ((0, 1), vec![GtkEntry::section((0, 2)), GtkEntry::item("Preferences", "app.preferences")]),
        ((0, 2), vec![GtkEntry::item("Copy", "win.copy"), GtkEntry::item("Paste", "win.paste")]),
    ]));
    let menu = AppMenu::new(Box::new(source));

    assert_eq!(labels(&menu, NodeId(0)), vec!["Edit"]);
    let edit = menu.tree().children(NodeId(0))[0];
    let section = menu.tree().children(edit)[0];
    assert_eq!(menu.tree().node(section).map(|node| node.kind()), Some(MenuKind::Section));
    assert_eq!(labels(&menu, section), vec!["Copy", "Paste"]);
}

#[tokio::test]
async fn test_model_events_travel_back_to_the_task() {
    let (source, mut channels) = client::channel(NodeId(0), "test");
    let menu = AppMenu::new(Box::new(source));
    menu.about_to_show(NodeId(4));
    menu.send_event(NodeId(4), ItemEvent::Opened);
    assert_eq!(menu.describe(), "test");

    assert_eq!(channels.next_request().await, Some(ClientRequest::AboutToShow(NodeId(4))));
    assert_eq!(
        channels.next_request().await,
        Some(ClientRequest::Event(NodeId(4), ItemEvent::Opened))
    );
}

#[test]
fn test_client_reports_its_root() {
    let (source, _channels) = client::channel(NodeId(0), "root");
    assert_eq!(source.root_id(), NodeId(0));
}
