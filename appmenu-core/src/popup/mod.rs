//! Popup menu engine.
//!
//! Popups live in a [PopupArena]. Each one knows its launcher widget, its parent popup and its
//! child popups by id. State changes are reported as [PopupSignal]s which the owner drains and
//! hands to the [MenuManager](crate::manager::MenuManager).

pub mod effect;
pub mod geometry;
pub mod keyboard;

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use log::debug;

use crate::widget::WidgetId;

pub use effect::{Effect, EffectFrame};
pub use geometry::{Rect, Side};

/// Default transition length.
pub const DEFAULT_EFFECT_TIME: Duration = Duration::from_millis(150);

/// Id of a popup inside a [PopupArena].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MenuId(pub u32);

impl fmt::Display for MenuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Lifecycle of a popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PopupState {
    /// Hidden.
    #[default]
    Closed,
    /// Open and playing its open transition.
    Opening,
    /// Open.
    Open,
    /// Playing its close transition, still shown.
    Closing,
}

impl PopupState {
    /// Whether the popup counts as open.
    pub fn is_open(self) -> bool {
        matches!(self, PopupState::Opening | PopupState::Open)
    }
}

/// Notifications produced by popup state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupSignal {
    /// The popup opened (`true`) or finished closing (`false`).
    OpenStateChanged(MenuId, bool),
    /// `(parent, child)`: a child popup was attached.
    ChildMenuAdded(MenuId, MenuId),
    /// `(parent, child)`: a child popup was detached.
    ChildMenuRemoved(MenuId, MenuId),
    /// The popup is gone.
    Destroyed(MenuId),
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    opening: bool,
    started: Instant,
    duration: Duration,
}

impl Transition {
    fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }
}

/// One popup menu.
#[derive(Debug, Clone)]
pub struct PopupMenu {
    id: MenuId,
    launcher: WidgetId,
    parent: Option<MenuId>,
    children: Vec<MenuId>,
    is_root: bool,
    state: PopupState,
    floating: bool,
    arrow_side: Side,
    arrow_alignment: f32,
    effect: Effect,
    effect_time: Duration,
    transition: Option<Transition>,
    open_child: Option<MenuId>,
    active_item: Option<WidgetId>,
    show_box_pointer: bool,
    fix_to_corner: bool,
    position: Option<Rect>,
}

impl PopupMenu {
    /// Popup id.
    pub fn id(&self) -> MenuId {
        self.id
    }

    /// The widget that opens this popup.
    pub fn launcher(&self) -> WidgetId {
        self.launcher
    }

    /// The popup containing the launcher.
    pub fn parent(&self) -> Option<MenuId> {
        self.parent
    }

    /// Popups launched from items of this one.
    pub fn children(&self) -> &[MenuId] {
        &self.children
    }

    /// Whether this is the applet's main menu.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Current state.
    pub fn state(&self) -> PopupState {
        self.state
    }

    /// Whether the popup counts as open.
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Whether the popup floats above everything instead of being laid out inline.
    pub fn is_floating(&self) -> bool {
        self.floating
    }

    /// Arrow side.
    pub fn arrow_side(&self) -> Side {
        self.arrow_side
    }

    /// Arrow alignment along the source, 0 to 1.
    pub fn arrow_alignment(&self) -> f32 {
        self.arrow_alignment
    }

    /// Transition kind.
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// Transition length.
    pub fn effect_time(&self) -> Duration {
        self.effect_time
    }

    /// The child popup currently open.
    pub fn open_child(&self) -> Option<MenuId> {
        self.open_child
    }

    /// Highlighted item.
    pub fn active_item(&self) -> Option<WidgetId> {
        self.active_item
    }

    /// Whether the arrow is drawn.
    pub fn shows_box_pointer(&self) -> bool {
        self.show_box_pointer
    }

    /// Whether the popup is aligned to its source's corner.
    pub fn is_fixed_to_corner(&self) -> bool {
        self.fix_to_corner
    }

    /// Last computed position.
    pub fn position(&self) -> Option<Rect> {
        self.position
    }

    /// Whether a transition is playing.
    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }
}

/// Owner of every popup of one menu tree.
#[derive(Debug, Default)]
pub struct PopupArena {
    menus: HashMap<MenuId, PopupMenu>,
    next_id: u32,
    signals: Vec<PopupSignal>,
}

impl PopupArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a closed popup launched by `launcher` from inside `parent`.
    pub fn create(&mut self, launcher: WidgetId, parent: Option<MenuId>, is_root: bool, floating: bool) -> MenuId {
        self.next_id += 1;
        let id = MenuId(self.next_id);
        let parent = parent.filter(|parent| self.menus.contains_key(parent));
        self.menus.insert(
            id,
            PopupMenu {
                id,
                launcher,
                parent,
                children: Vec::new(),
                is_root,
                state: PopupState::Closed,
                floating,
                arrow_side: if is_root { Side::Bottom } else { Side::Left },
                arrow_alignment: 0.0,
                effect: Effect::None,
                effect_time: DEFAULT_EFFECT_TIME,
                transition: None,
                open_child: None,
                active_item: None,
                show_box_pointer: true,
                fix_to_corner: false,
                position: None,
            },
        );
        if let Some(parent) = parent {
            if let Some(menu) = self.menus.get_mut(&parent) {
                menu.children.push(id);
            }
            self.signals.push(PopupSignal::ChildMenuAdded(parent, id));
        }
        id
    }

    /// Look up a popup.
    pub fn get(&self, id: MenuId) -> Option<&PopupMenu> {
        self.menus.get(&id)
    }

    /// Whether the popup exists.
    pub fn contains(&self, id: MenuId) -> bool {
        self.menus.contains_key(&id)
    }

    /// Number of popups.
    pub fn len(&self) -> usize {
        self.menus.len()
    }

    /// Whether there are no popups.
    pub fn is_empty(&self) -> bool {
        self.menus.is_empty()
    }

    /// State of a popup, `Closed` for unknown ids.
    pub fn state(&self, id: MenuId) -> PopupState {
        self.menus.get(&id).map(|menu| menu.state).unwrap_or_default()
    }

    /// Whether a popup counts as open.
    pub fn is_open(&self, id: MenuId) -> bool {
        self.state(id).is_open()
    }

    /// Whether a popup floats.
    pub fn is_floating(&self, id: MenuId) -> bool {
        self.menus.get(&id).map(|menu| menu.floating).unwrap_or(false)
    }

    /// Whether `child` is a direct child popup of `parent`.
    pub fn is_child_menu(&self, parent: MenuId, child: MenuId) -> bool {
        self.menus
            .get(&parent)
            .map(|menu| menu.children.contains(&child))
            .unwrap_or(false)
    }

    /// The popup containing `id`'s launcher.
    pub fn top_menu(&self, id: MenuId) -> Option<MenuId> {
        self.menus.get(&id).and_then(|menu| menu.parent)
    }

    /// Number of ancestors of a popup.
    pub fn depth(&self, id: MenuId) -> usize {
        let mut depth = 0;
        let mut cursor = self.top_menu(id);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.top_menu(parent);
        }
        depth
    }

    /// Take queued signals.
    pub fn drain_signals(&mut self) -> Vec<PopupSignal> {
        std::mem::take(&mut self.signals)
    }

    /// Open a popup.
    ///
    /// Does nothing when the popup is already open. A floating main menu only opens when it
    /// has child popups. An open sibling is closed first. Returns whether the popup opened.
    pub fn open(&mut self, id: MenuId, animate: bool, now: Instant) -> bool {
        let Some(menu) = self.menus.get(&id) else {
            return false;
        };
        match menu.state {
            PopupState::Opening | PopupState::Open => return false,
            PopupState::Closing => {
                if let Some(menu) = self.menus.get_mut(&id) {
                    menu.state = PopupState::Open;
                    menu.transition = None;
                }
                return true;
            },
            PopupState::Closed => {},
        }
        if menu.is_root && menu.floating && menu.children.is_empty() {
            debug!("Not opening empty main menu {id}");
            return false;
        }

        self.close_brother_menu(id, now);

        let Some(menu) = self.menus.get_mut(&id) else {
            return false;
        };
        if animate && menu.floating && menu.effect.is_animated() {
            menu.state = PopupState::Opening;
            menu.transition = Some(Transition {
                opening: true,
                started: now,
                duration: menu.effect_time,
            });
        } else {
            menu.state = PopupState::Open;
            menu.transition = None;
        }
        self.signals.push(PopupSignal::OpenStateChanged(id, true));
        true
    }

    /// Close a popup and, first, its open child.
    ///
    /// Docked popups stay laid out unless `forced`. Returns whether the popup started closing.
    pub fn close(&mut self, id: MenuId, animate: bool, forced: bool, now: Instant) -> bool {
        let Some(menu) = self.menus.get(&id) else {
            return false;
        };
        if !menu.state.is_open() {
            return false;
        }
        if !menu.floating && !forced {
            return false;
        }

        if let Some(child) = menu.open_child {
            self.close(child, animate, true, now);
        }

        let Some(menu) = self.menus.get_mut(&id) else {
            return false;
        };
        menu.open_child = None;
        menu.active_item = None;
        if animate && menu.floating && menu.effect.is_animated() {
            menu.state = PopupState::Closing;
            menu.transition = Some(Transition {
                opening: false,
                started: now,
                duration: menu.effect_time,
            });
        } else {
            self.finish_close(id);
        }
        true
    }

    /// Open a closed popup or close an open one.
    pub fn toggle(&mut self, id: MenuId, animate: bool, now: Instant) -> bool {
        if self.is_open(id) {
            self.close(id, animate, false, now)
        } else {
            self.open(id, animate, now)
        }
    }

    /// Toggle without animation, closing docked popups too.
    pub fn forced_toggle(&mut self, id: MenuId, now: Instant) -> bool {
        if self.is_open(id) {
            self.close(id, false, true, now)
        } else {
            self.open(id, false, now)
        }
    }

    /// Finish transitions whose time is up. Returns whether any transition is still playing.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut finished = Vec::new();
        let mut playing = false;
        for menu in self.menus.values_mut() {
            if let Some(transition) = menu.transition {
                if transition.progress(now) >= 1.0 {
                    finished.push((menu.id, transition.opening));
                } else {
                    playing = true;
                }
            }
        }

        for (id, opening) in finished {
            if opening {
                if let Some(menu) = self.menus.get_mut(&id) {
                    menu.state = PopupState::Open;
                    menu.transition = None;
                }
            } else {
                self.finish_close(id);
            }
        }
        playing
    }

    /// Visual transform of a popup at `now`.
    pub fn frame(&self, id: MenuId, now: Instant) -> EffectFrame {
        let Some(menu) = self.menus.get(&id) else {
            return EffectFrame::HIDDEN;
        };
        match (menu.state, menu.transition) {
            (PopupState::Closed, _) => EffectFrame::HIDDEN,
            (_, Some(transition)) => menu.effect.frame(transition.progress(now), transition.opening),
            _ => EffectFrame::IDENTITY,
        }
    }

    /// Highlight an item.
    pub fn set_active_item(&mut self, id: MenuId, item: Option<WidgetId>) {
        if let Some(menu) = self.menus.get_mut(&id) {
            menu.active_item = item;
        }
    }

    /// Change the arrow side. A docked main menu hands its side down to its children.
    pub fn set_arrow_side(&mut self, id: MenuId, side: Side) {
        let Some(menu) = self.menus.get_mut(&id) else {
            return;
        };
        menu.arrow_side = side;
        if menu.is_root && !menu.floating {
            let children = menu.children.clone();
            for child in children {
                if let Some(child) = self.menus.get_mut(&child) {
                    child.arrow_side = side;
                }
            }
        }
    }

    /// Change the arrow alignment.
    pub fn set_arrow_alignment(&mut self, id: MenuId, alignment: f32) {
        if let Some(menu) = self.menus.get_mut(&id) {
            menu.arrow_alignment = alignment.clamp(0.0, 1.0);
        }
    }

    /// Recompute the arrow sides of a popup's children from its position on the monitor.
    ///
    /// `child_width` reports the natural width of a child popup.
    pub fn set_childs_arrow_side(&mut self, id: MenuId, monitor: Rect, child_width: impl Fn(MenuId) -> f32) {
        let Some(menu) = self.menus.get(&id) else {
            return;
        };
        let children = menu.children.clone();
        if menu.is_root && !menu.floating {
            let side = menu.arrow_side;
            for child in children {
                if let Some(child) = self.menus.get_mut(&child) {
                    child.arrow_side = side;
                }
            }
            return;
        }

        let Some(position) = menu.position else {
            debug!("Popup {id} has no position, keeping child sides");
            return;
        };
        let widths: Vec<f32> = children.iter().map(|child| child_width(*child)).collect();
        let sides = geometry::child_arrow_sides(menu.arrow_side, position, &widths, monitor);
        for (child, side) in children.into_iter().zip(sides) {
            if let Some(child) = self.menus.get_mut(&child) {
                child.arrow_side = side;
            }
        }
    }

    /// Record where a popup was placed.
    pub fn set_position(&mut self, id: MenuId, rect: Rect) {
        if let Some(menu) = self.menus.get_mut(&id) {
            menu.position = Some(rect);
        }
    }

    /// Switch between floating and docked. The popup is closed first.
    pub fn set_floating(&mut self, id: MenuId, floating: bool, now: Instant) {
        self.close(id, false, true, now);
        if let Some(menu) = self.menus.get_mut(&id) {
            menu.floating = floating;
        }
    }

    /// Change the transition kind.
    pub fn set_effect(&mut self, id: MenuId, effect: Effect) {
        if let Some(menu) = self.menus.get_mut(&id) {
            menu.effect = effect;
        }
    }

    /// Change the transition length.
    pub fn set_effect_time(&mut self, id: MenuId, time: Duration) {
        if let Some(menu) = self.menus.get_mut(&id) {
            menu.effect_time = time;
        }
    }

    /// Show or hide the arrow.
    pub fn show_box_pointer(&mut self, id: MenuId, show: bool) {
        if let Some(menu) = self.menus.get_mut(&id) {
            menu.show_box_pointer = show;
        }
    }

    /// Align the popup to its source's corner.
    pub fn fix_to_corner(&mut self, id: MenuId, fix: bool) {
        if let Some(menu) = self.menus.get_mut(&id) {
            menu.fix_to_corner = fix;
        }
    }

    /// Close and remove a popup. Child popups are detached, not destroyed.
    pub fn destroy(&mut self, id: MenuId, now: Instant) -> bool {
        if !self.menus.contains_key(&id) {
            return false;
        }
        self.close(id, false, true, now);
        // A close transition of the popup itself cannot outlive it.
        if self.state(id) != PopupState::Closed {
            self.finish_close(id);
        }

        let Some(menu) = self.menus.remove(&id) else {
            return false;
        };
        for child in &menu.children {
            if let Some(child) = self.menus.get_mut(child) {
                child.parent = None;
            }
        }
        if let Some(parent) = menu.parent {
            if let Some(parent_menu) = self.menus.get_mut(&parent) {
                parent_menu.children.retain(|child| *child != id);
                if parent_menu.open_child == Some(id) {
                    parent_menu.open_child = None;
                }
            }
            self.signals.push(PopupSignal::ChildMenuRemoved(parent, id));
        }
        self.signals.push(PopupSignal::Destroyed(id));
        true
    }

    fn close_brother_menu(&mut self, id: MenuId, now: Instant) {
        let Some(parent) = self.top_menu(id) else {
            return;
        };
        let brother = self.menus.get(&parent).and_then(|menu| menu.open_child);
        if let Some(brother) = brother.filter(|brother| *brother != id) {
            if self.is_open(brother) {
                self.close(brother, false, true, now);
            }
        }
        if let Some(menu) = self.menus.get_mut(&parent) {
            menu.open_child = Some(id);
        }
    }

    fn finish_close(&mut self, id: MenuId) {
        let Some(menu) = self.menus.get_mut(&id) else {
            return;
        };
        menu.state = PopupState::Closed;
        menu.transition = None;
        let parent = menu.parent;
        if let Some(parent) = parent.and_then(|parent| self.menus.get_mut(&parent)) {
            if parent.open_child == Some(id) {
                parent.open_child = None;
            }
        }
        self.signals.push(PopupSignal::OpenStateChanged(id, false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> (PopupArena, MenuId, MenuId, MenuId) {
        let mut arena = PopupArena::new();
        let root = arena.create(WidgetId(1), None, true, true);
        let a = arena.create(WidgetId(2), Some(root), false, true);
        let b = arena.create(WidgetId(3), Some(root), false, true);
        arena.drain_signals();
        (arena, root, a, b)
    }

    #[test]
    fn test_open_close_without_children() {
        let mut arena = PopupArena::new();
        let now = Instant::now();
        let menu = arena.create(WidgetId(1), None, false, true);

        assert!(arena.open(menu, false, now));
        assert!(!arena.open(menu, false, now));
        assert!(arena.close(menu, false, false, now));
        assert_eq!(arena.state(menu), PopupState::Closed);
        assert_eq!(
            arena.drain_signals(),
            vec![
                PopupSignal::OpenStateChanged(menu, true),
                PopupSignal::OpenStateChanged(menu, false),
            ]
        );
    }

    #[test]
    fn test_floating_root_needs_children() {
        let mut arena = PopupArena::new();
        let root = arena.create(WidgetId(1), None, true, true);
        assert!(!arena.open(root, false, Instant::now()));
    }

    #[test]
    fn test_opening_sibling_closes_brother() {
        let (mut arena, root, a, b) = arena();
        let now = Instant::now();
        arena.open(root, false, now);
        arena.open(a, false, now);
        arena.open(b, false, now);

        assert_eq!(arena.state(a), PopupState::Closed);
        assert!(arena.is_open(b));
        assert_eq!(arena.get(root).and_then(PopupMenu::open_child), Some(b));
    }

    #[test]
    fn test_close_is_depth_first() {
        let (mut arena, root, a, _) = arena();
        let now = Instant::now();
        arena.open(root, false, now);
        arena.open(a, false, now);
        arena.drain_signals();

        arena.close(root, false, false, now);
        assert_eq!(
            arena.drain_signals(),
            vec![
                PopupSignal::OpenStateChanged(a, false),
                PopupSignal::OpenStateChanged(root, false),
            ]
        );
    }

    #[test]
    fn test_docked_closes_only_when_forced() {
        let mut arena = PopupArena::new();
        let now = Instant::now();
        let root = arena.create(WidgetId(1), None, true, false);

        assert!(arena.open(root, false, now));
        assert!(!arena.close(root, false, false, now));
        assert!(arena.is_open(root));
        assert!(arena.forced_toggle(root, now));
        assert_eq!(arena.state(root), PopupState::Closed);
    }

    #[test]
    fn test_animated_transitions_complete_on_tick() {
        let mut arena = PopupArena::new();
        let start = Instant::now();
        let menu = arena.create(WidgetId(1), None, false, true);
        arena.set_effect(menu, Effect::Dispel);

        arena.open(menu, true, start);
        assert_eq!(arena.state(menu), PopupState::Opening);
        assert!(arena.tick(start + Duration::from_millis(50)));
        assert!(!arena.tick(start + DEFAULT_EFFECT_TIME));
        assert_eq!(arena.state(menu), PopupState::Open);

        let later = start + Duration::from_secs(1);
        arena.drain_signals();
        arena.close(menu, true, false, later);
        assert_eq!(arena.state(menu), PopupState::Closing);
        assert!(arena.drain_signals().is_empty());
        arena.tick(later + DEFAULT_EFFECT_TIME);
        assert_eq!(arena.drain_signals(), vec![PopupSignal::OpenStateChanged(menu, false)]);
    }

    #[test]
    fn test_destroy_detaches_from_parent() {
        let (mut arena, root, a, b) = arena();
        let now = Instant::now();
        arena.open(root, false, now);
        arena.open(a, false, now);
        arena.drain_signals();

        assert!(arena.destroy(a, now));
        assert!(!arena.is_child_menu(root, a));
        assert!(arena.is_child_menu(root, b));
        assert_eq!(arena.get(root).and_then(PopupMenu::open_child), None);
        assert_eq!(
            arena.drain_signals(),
            vec![
                PopupSignal::OpenStateChanged(a, false),
                PopupSignal::ChildMenuRemoved(root, a),
                PopupSignal::Destroyed(a),
            ]
        );
    }
}
