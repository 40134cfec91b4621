use std::time::{Duration, Instant};

use appmenu_core::grab::{CoordinatorId, InputGrab};
use appmenu_core::manager::{MenuManager, MenuSettings};
use appmenu_core::popup::{Effect, MenuId, PopupArena, PopupState};
use appmenu_core::widget::WidgetId;

fn pump(manager: &mut MenuManager, arena: &mut PopupArena, now: Instant) {
    loop {
        let signals = arena.drain_signals();
        if signals.is_empty() {
            return;
        }
        for signal in signals {
            manager.handle_signal(arena, signal, now);
        }
    }
}

fn open_with_grab(manager: &MenuManager, arena: &PopupArena, menus: &[MenuId]) -> usize {
    if !manager.is_grabbed() {
        return 0;
    }
    menus.iter().filter(|menu| arena.is_open(**menu)).count()
}

#[test]
fn test_add_then_remove_restores_managed_set() {
    let now = Instant::now();
    let grab = InputGrab::new();
    let mut arena = PopupArena::new();
    let mut manager = MenuManager::new(CoordinatorId(7), grab.clone(), MenuSettings::default());
    let root = arena.create(WidgetId(1), None, true, true);
    manager.add_menu(&mut arena, root, now);
    let before = manager.len();

    let menu = arena.create(WidgetId(2), None, false, true);
    assert!(manager.add_menu(&mut arena, menu, now));
    assert!(!manager.add_menu(&mut arena, menu, now));
    arena.open(menu, false, now);
    pump(&mut manager, &mut arena, now);
    assert_eq!(grab.owner(), Some(CoordinatorId(7)));

    assert!(manager.remove_menu(menu));
    assert_eq!(manager.len(), before);
    assert_eq!(grab.owner(), None);
    assert!(!manager.remove_menu(menu));
}

#[test]
fn test_settings_reach_submenus_but_not_the_main_menu() {
    let now = Instant::now();
    let settings = MenuSettings {
        floating: false,
        show_box_pointer: false,
        fix_to_corner: true,
        effect: Effect::Scale,
        effect_time: Duration::from_millis(300),
    };
    let mut arena = PopupArena::new();
    let mut manager = MenuManager::new(CoordinatorId(1), InputGrab::new(), settings);
    let root = arena.create(WidgetId(1), None, true, true);
    let child = arena.create(WidgetId(2), Some(root), false, true);
    manager.add_menu(&mut arena, root, now);

    let child_popup = arena.get(child).unwrap();
    assert!(!child_popup.is_floating());
    assert!(!child_popup.shows_box_pointer());
    assert!(child_popup.is_fixed_to_corner());
    assert_eq!(child_popup.effect(), Effect::Scale);
    assert_eq!(child_popup.effect_time(), Duration::from_millis(300));

    let root_popup = arena.get(root).unwrap();
    assert!(root_popup.is_floating());
    assert_eq!(root_popup.effect(), Effect::None);
}

#[test]
fn test_hover_switch_never_opens_two_siblings() {
    let now = Instant::now();
    let mut arena = PopupArena::new();
    let mut manager = MenuManager::new(CoordinatorId(1), InputGrab::new(), MenuSettings::default());
    manager.set_hover_policy(true, true);
    let root = arena.create(WidgetId(1), None, true, true);
    let a = arena.create(WidgetId(2), Some(root), false, true);
    let b = arena.create(WidgetId(3), Some(root), false, true);
    let a_child = arena.create(WidgetId(4), Some(a), false, true);
    manager.add_menu(&mut arena, root, now);
    pump(&mut manager, &mut arena, now);

    arena.open(root, false, now);
    pump(&mut manager, &mut arena, now);
    let opened = manager.source_enter(&mut arena, a, now);
    assert_eq!(opened, Some(a));
    arena.open(a, false, now);
    arena.open(a_child, false, now);
    pump(&mut manager, &mut arena, now);
    assert_eq!(manager.chain(), &[root, a, a_child]);

    let opened = manager.source_enter(&mut arena, b, now);
    assert_eq!(opened, Some(b));
    pump(&mut manager, &mut arena, now);
    assert_eq!(manager.chain(), &[root]);
    arena.open(b, false, now);
    pump(&mut manager, &mut arena, now);

    assert_eq!(manager.chain(), &[root, b]);
    assert_eq!(arena.state(a), PopupState::Closed);
    assert_eq!(arena.state(a_child), PopupState::Closed);
    assert_eq!(open_with_grab(&manager, &arena, &[a, b]), 1);
}

#[test]
fn test_two_coordinators_share_one_grab() {
    let now = Instant::now();
    let grab = InputGrab::new();
    let mut first_arena = PopupArena::new();
    let mut second_arena = PopupArena::new();
    let mut first = MenuManager::new(CoordinatorId(1), grab.clone(), MenuSettings::default());
    let mut second = MenuManager::new(CoordinatorId(2), grab.clone(), MenuSettings::default());
    let one = first_arena.create(WidgetId(1), None, false, true);
    let two = second_arena.create(WidgetId(1), None, false, true);
    first.add_menu(&mut first_arena, one, now);
    second.add_menu(&mut second_arena, two, now);

    first_arena.open(one, false, now);
    pump(&mut first, &mut first_arena, now);
    second_arena.open(two, false, now);
    pump(&mut second, &mut second_arena, now);

    assert!(first.is_grabbed());
    assert!(!second.is_grabbed());

    first_arena.close(one, false, false, now);
    pump(&mut first, &mut first_arena, now);
    assert_eq!(grab.owner(), None);
}
