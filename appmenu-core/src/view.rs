//! One displayed menu: the widgets, popups and coordinator built for a [MenuTree].
//!
//! A [MenuView] never owns its tree. The owner keeps the tree (usually inside a
//! [WindowRegistry](crate::registry::WindowRegistry)) and passes it to the calls that need to
//! read it. Things the application has to be told about are collected as [ViewAction]s.

use std::fmt;
use std::time::Instant;

use log::{debug, warn};

use crate::binder::{Binder, MenuHost};
use crate::config::AppletConfig;
use crate::focus::FocusTarget;
use crate::grab::{CoordinatorId, InputGrab};
use crate::manager::{CapturedEvent, EventDisposition, MenuManager};
use crate::model::{MenuKind, MenuTree, ModelEvent, NodeId};
use crate::popup::geometry::{self, Placement, PointerStyle};
use crate::popup::keyboard::{border_is_first, escape_key, submenu_keys, Key};
use crate::popup::{MenuId, PopupArena, PopupSignal, Rect, Side};
use crate::signal::{Inbox, Subscription};
use crate::source::ItemEvent;
use crate::time::Clock;
use crate::widget::WidgetId;

/// Requests for the application behind the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    /// Report an item event.
    Dispatch(NodeId, ItemEvent),
    /// The submenu of the node is about to be shown.
    AboutToShow(NodeId),
}

struct Host<'a> {
    arena: &'a mut PopupArena,
    focus: &'a mut Option<FocusTarget>,
    root_floating: bool,
    submenu_floating: bool,
    now: Instant,
}

impl MenuHost for Host<'_> {
    fn create_menu(&mut self, launcher: WidgetId, parent: Option<MenuId>, is_root: bool) -> MenuId {
        let floating = if is_root { self.root_floating } else { self.submenu_floating };
        self.arena.create(launcher, parent, is_root, floating)
    }

    fn release_menu(&mut self, menu: MenuId) {
        self.arena.destroy(menu, self.now);
    }

    fn focus(&self) -> Option<FocusTarget> {
        *self.focus
    }

    fn set_focus(&mut self, focus: Option<FocusTarget>) {
        *self.focus = focus;
    }
}

/// Widgets, popups and input handling for one menu tree.
pub struct MenuView {
    tree_instance: u64,
    binder: Binder,
    arena: PopupArena,
    manager: MenuManager,
    focus: Option<FocusTarget>,
    inbox: Inbox<ModelEvent>,
    _subscription: Subscription,
    clock: Box<dyn Clock>,
    config: AppletConfig,
    actions: Vec<ViewAction>,
    hovered: Option<WidgetId>,
    hovered_menu: Option<MenuId>,
}

impl MenuView {
    /// Build the main menu of `tree` and its top-level items.
    pub fn new(
        tree: &MenuTree,
        config: &AppletConfig,
        grab: InputGrab,
        coordinator: CoordinatorId,
        clock: Box<dyn Clock>,
    ) -> Self {
        let (subscription, inbox) = tree.queue();
        let mut manager = MenuManager::new(coordinator, grab, config.menu_settings());
        manager.set_hover_policy(config.open_on_hover, config.close_active_submenu);

        let mut view = Self {
            tree_instance: tree.instance(),
            binder: Binder::new(config.widget_settings()),
            arena: PopupArena::new(),
            manager,
            focus: None,
            inbox,
            _subscription: subscription,
            clock,
            config: config.clone(),
            actions: Vec::new(),
            hovered: None,
            hovered_menu: None,
        };

        let now = view.clock.now();
        let (binder, mut host) = view.parts();
        let root = binder.materialize(tree, tree.root(), &mut host);
        if let Some(menu) = view.root_menu() {
            view.apply_root_settings(menu);
            view.manager.add_menu(&mut view.arena, menu, now);
        }
        if let Some(root) = root {
            let (binder, mut host) = view.parts();
            binder.ensure_populated(tree, root, &mut host);
        }
        view.process_signals();
        view
    }

    /// Apply the model events received since the last call.
    pub fn sync(&mut self, tree: &MenuTree) {
        if tree.instance() != self.tree_instance {
            warn!("Menu view of tree {} handed tree {}", self.tree_instance, tree.instance());
            return;
        }

        for event in self.inbox.drain() {
            let (binder, mut host) = self.parts();
            binder.handle(tree, &event, &mut host);
            if let ModelEvent::ChildrenEmpty(node) = event {
                self.collapse(node);
            }
        }
        self.process_signals();
    }

    /// Build the children of queued containers in the background. Returns how many containers
    /// were populated.
    pub fn run_idle(&mut self, tree: &MenuTree, budget: usize) -> usize {
        let (binder, mut host) = self.parts();
        let done = binder.run_idle(tree, &mut host, budget);
        self.process_signals();
        done
    }

    /// Advance transitions and the leave timer. Returns whether a transition is still playing.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        let playing = self.arena.tick(now);
        self.manager.tick(&mut self.arena, now, self.hovered_menu);
        self.process_signals();
        playing
    }

    /// Open the main menu.
    pub fn open_root(&mut self, tree: &MenuTree, animate: bool) -> bool {
        match self.root_menu() {
            Some(menu) => self.open_popup(tree, menu, animate),
            None => false,
        }
    }

    /// Open the popup of a submenu or root widget.
    pub fn open_menu(&mut self, tree: &MenuTree, widget: WidgetId) -> bool {
        match self.binder.widget(widget).and_then(|widget| widget.menu) {
            Some(menu) => self.open_popup(tree, menu, true),
            None => false,
        }
    }

    /// Close a popup.
    pub fn close_menu(&mut self, menu: MenuId, forced: bool) -> bool {
        let now = self.clock.now();
        let closed = self.arena.close(menu, true, forced, now);
        self.process_signals();
        closed
    }

    /// Close every floating popup.
    pub fn close_all(&mut self) {
        let now = self.clock.now();
        self.manager.close_all(&mut self.arena, now);
        self.process_signals();
    }

    /// Open a closed popup, close an open one.
    pub fn toggle(&mut self, tree: &MenuTree, menu: MenuId) -> bool {
        if self.arena.is_open(menu) {
            self.close_menu(menu, false)
        } else {
            self.open_popup(tree, menu, true)
        }
    }

    /// Toggle the main menu without animation, closing it even when docked.
    pub fn forced_toggle(&mut self, tree: &MenuTree) -> bool {
        let Some(menu) = self.root_menu() else {
            return false;
        };
        if self.arena.is_open(menu) {
            let now = self.clock.now();
            let closed = self.arena.close(menu, false, true, now);
            self.process_signals();
            closed
        } else {
            self.open_popup(tree, menu, false)
        }
    }

    /// A widget was clicked or activated from the keyboard.
    ///
    /// Items report `clicked` and close the floating popups. Submenu launchers toggle their
    /// popup.
    pub fn activate(&mut self, tree: &MenuTree, widget: WidgetId) -> bool {
        if let Some(node) = self.binder.activate(widget) {
            self.actions.push(ViewAction::Dispatch(node, ItemEvent::Clicked));
            self.close_all();
            return true;
        }
        let Some(target) = self.binder.widget(widget) else {
            return false;
        };
        match (target.kind(), target.menu) {
            (MenuKind::SubMenu, Some(menu)) if target.is_sensitive() => self.toggle(tree, menu),
            _ => false,
        }
    }

    /// The pointer moved onto `target`, or off every item for `None`.
    pub fn hover(&mut self, tree: &MenuTree, target: Option<WidgetId>) {
        if self.hovered == target {
            return;
        }
        let now = self.clock.now();

        if let Some(previous) = self.hovered.take() {
            let menu = self.binder.widget(previous).and_then(|widget| widget.menu);
            if !menu.is_some_and(|menu| self.arena.is_open(menu)) {
                self.binder.set_active(previous, false);
            }
            if let Some(menu) = menu {
                self.manager.source_leave(menu, now);
            }
        }

        self.hovered = target;
        self.hovered_menu = target.and_then(|target| self.binder.popup_of(target));
        let Some(target) = target else {
            return;
        };
        let Some(widget) = self.binder.widget(target) else {
            return;
        };
        if !widget.is_navigable() {
            return;
        }
        let submenu = widget.menu.filter(|_| widget.kind() == MenuKind::SubMenu);
        let top_level = widget.parent().is_some() && widget.parent() == self.binder.root();

        if let Some(menu) = self.hovered_menu {
            self.focus_item(menu, target);
        }
        if let Some(menu) = submenu {
            if let Some(open) = self.manager.source_enter(&mut self.arena, menu, now) {
                self.open_popup(tree, open, true);
            } else if top_level && self.is_docked_root() && self.config.open_on_hover && !self.arena.is_open(menu) {
                self.open_popup(tree, menu, true);
            }
        }
        self.process_signals();
    }

    /// The pointer is over a popup body, not over an item.
    pub fn pointer_over_menu(&mut self, menu: Option<MenuId>) {
        self.hovered_menu = menu;
    }

    /// Filter an input event while a popup may hold the grab. `over` is the popup under the
    /// pointer.
    pub fn capture_event(&mut self, event: CapturedEvent, over: Option<MenuId>) -> EventDisposition {
        let now = self.clock.now();
        let inside = over.is_some_and(|menu| self.manager.chain_contains(menu));
        let disposition = self.manager.capture_event(&mut self.arena, event, inside, now);
        self.process_signals();
        disposition
    }

    /// Keyboard navigation. Returns whether the key was used.
    pub fn key_press(&mut self, tree: &MenuTree, key: Key) -> bool {
        let Some(menu) = self.focused_menu() else {
            return false;
        };
        let Some(popup) = self.arena.get(menu) else {
            return false;
        };
        let side = popup.arrow_side();
        let is_root = popup.is_root();
        let docked_root = is_root && !popup.is_floating();
        let current = match self.focus {
            Some(FocusTarget::Widget(widget)) => Some(widget),
            _ => None,
        };

        if key == Key::Escape {
            return self.escape_menu(menu);
        }
        if key.is_activation() {
            return current.is_some_and(|widget| self.activate(tree, widget));
        }

        let submenu = current
            .and_then(|widget| self.binder.widget(widget))
            .filter(|widget| widget.kind() == MenuKind::SubMenu && widget.is_sensitive())
            .and_then(|widget| widget.menu);
        if let Some(submenu) = submenu {
            let into = if docked_root {
                match side {
                    Side::Bottom => Key::Up,
                    _ => Key::Down,
                }
            } else {
                submenu_keys(self.arena.get(submenu).map(|popup| popup.arrow_side()).unwrap_or_default()).0
            };
            if key == into {
                self.open_popup(tree, submenu, true);
                self.focus_first(submenu);
                return true;
            }
        }

        let items = self.navigable_items(menu);
        if docked_root {
            let forward = match key {
                Key::Right => true,
                Key::Left => false,
                _ => return false,
            };
            return self.step_top_level(tree, current, forward, false);
        }

        let index = current.and_then(|widget| items.iter().position(|item| *item == widget));
        let at_border = match index {
            Some(index) if border_is_first(side) => index == 0,
            Some(index) => index + 1 == items.len(),
            None => false,
        };
        if !is_root && escape_key(side, at_border) == Some(key) {
            return self.escape_menu(menu);
        }

        match key {
            Key::Up | Key::Down => {
                if items.is_empty() {
                    return false;
                }
                let next = match (index, key) {
                    (None, Key::Down) => 0,
                    (None, _) => items.len() - 1,
                    (Some(index), Key::Down) => (index + 1) % items.len(),
                    (Some(index), _) => (index + items.len() - 1) % items.len(),
                };
                self.focus_item(menu, items[next]);
                true
            },
            Key::Left | Key::Right => {
                // Inside a docked main menu, sideways keys move to the neighbouring top-level item.
                let Some(top_item) = self.top_level_launcher(menu) else {
                    return false;
                };
                self.step_top_level(tree, Some(top_item), key == Key::Right, true)
            },
            _ => false,
        }
    }

    /// Replace the configuration and re-apply it to every widget and popup.
    pub fn apply_config(&mut self, config: &AppletConfig) {
        let now = self.clock.now();
        self.config = config.clone();
        self.binder.apply_settings(config.widget_settings());
        self.manager.set_hover_policy(config.open_on_hover, config.close_active_submenu);
        self.manager.set_settings(&mut self.arena, config.menu_settings(), now);
        if let Some(menu) = self.root_menu() {
            if self.arena.is_floating(menu) != config.floating_root() {
                self.arena.set_floating(menu, config.floating_root(), now);
            }
            self.apply_root_settings(menu);
        }
        self.process_signals();
    }

    /// Set the arrow side of the main menu, usually from the panel edge.
    pub fn set_arrow_side(&mut self, side: Side) {
        if let Some(menu) = self.root_menu() {
            self.arena.set_arrow_side(menu, side);
        }
    }

    /// Place a popup next to its launcher and record the result.
    pub fn place_menu(&mut self, menu: MenuId, source: Rect, width: f32, height: f32, monitor: Rect) -> Option<Placement> {
        let popup = self.arena.get(menu)?;
        let placement = geometry::place_popup(
            source,
            width,
            height,
            popup.arrow_side(),
            popup.arrow_alignment(),
            popup.is_fixed_to_corner(),
            monitor,
            PointerStyle::default(),
        );
        self.arena.set_position(menu, placement.rect);
        Some(placement)
    }

    /// Recompute which way the child popups of `menu` open.
    pub fn update_child_sides(&mut self, menu: MenuId, monitor: Rect, child_width: impl Fn(MenuId) -> f32) {
        self.arena.set_childs_arrow_side(menu, monitor, child_width);
    }

    /// Destroy every widget and popup.
    pub fn shutdown(&mut self) {
        let (binder, mut host) = self.parts();
        binder.clear(&mut host);
        self.process_signals();
        self.focus = None;
    }

    /// Take the requests collected since the last call.
    pub fn take_actions(&mut self) -> Vec<ViewAction> {
        std::mem::take(&mut self.actions)
    }

    /// Popup of the root widget.
    pub fn root_menu(&self) -> Option<MenuId> {
        self.binder.root().and_then(|root| self.binder.widget(root)).and_then(|root| root.menu)
    }

    /// Instance of the tree this view mirrors.
    pub fn tree_instance(&self) -> u64 {
        self.tree_instance
    }

    /// The widgets.
    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// The popups.
    pub fn arena(&self) -> &PopupArena {
        &self.arena
    }

    /// The coordinator.
    pub fn manager(&self) -> &MenuManager {
        &self.manager
    }

    /// Current keyboard focus.
    pub fn focus(&self) -> Option<FocusTarget> {
        self.focus
    }

    /// Move keyboard focus, e.g. to [FocusTarget::Launcher] when the panel button takes it.
    pub fn set_focus(&mut self, focus: Option<FocusTarget>) {
        self.focus = focus;
    }

    /// Widget under the pointer.
    pub fn hovered(&self) -> Option<WidgetId> {
        self.hovered
    }

    fn parts(&mut self) -> (&mut Binder, Host<'_>) {
        let now = self.clock.now();
        (
            &mut self.binder,
            Host {
                arena: &mut self.arena,
                focus: &mut self.focus,
                root_floating: self.config.floating_root(),
                submenu_floating: self.config.floating_submenu,
                now,
            },
        )
    }

    fn open_popup(&mut self, tree: &MenuTree, menu: MenuId, animate: bool) -> bool {
        let Some(owner) = self.binder.menu_owner(menu) else {
            return false;
        };
        if let Some(widget) = self.binder.widget(owner).filter(|widget| widget.kind() == MenuKind::SubMenu) {
            self.actions.push(ViewAction::AboutToShow(widget.node()));
        }
        let (binder, mut host) = self.parts();
        binder.ensure_populated(tree, owner, &mut host);

        let now = self.clock.now();
        let opened = self.arena.open(menu, animate, now);
        self.process_signals();
        opened
    }

    fn process_signals(&mut self) {
        let now = self.clock.now();
        loop {
            let signals = self.arena.drain_signals();
            if signals.is_empty() {
                break;
            }
            for signal in signals {
                self.manager.handle_signal(&mut self.arena, signal, now);
                if let PopupSignal::OpenStateChanged(menu, open) = signal {
                    self.on_open_state(menu, open);
                }
            }
        }
    }

    fn on_open_state(&mut self, menu: MenuId, open: bool) {
        let Some(owner) = self.binder.menu_owner(menu) else {
            return;
        };
        let Some(widget) = self.binder.widget(owner) else {
            return;
        };
        let node = widget.node();
        let kind = widget.kind();

        if kind == MenuKind::SubMenu {
            self.binder.set_active(owner, open);
            let event = if open { ItemEvent::Opened } else { ItemEvent::Closed };
            self.actions.push(ViewAction::Dispatch(node, event));
        }
        if !open && self.focus_is_in(menu) {
            self.focus = Some(match kind {
                MenuKind::Root => FocusTarget::Launcher,
                _ => FocusTarget::Widget(owner),
            });
        }
    }

    fn collapse(&mut self, node: NodeId) {
        let Some(menu) = self.binder.widget_for(node).and_then(|widget| widget.menu) else {
            return;
        };
        if self.arena.is_open(menu) {
            debug!("Closing {menu}, its node {node} lost every child");
            let now = self.clock.now();
            self.arena.close(menu, false, true, now);
        }
    }

    fn escape_menu(&mut self, menu: MenuId) -> bool {
        let Some(popup) = self.arena.get(menu) else {
            return false;
        };
        let is_root = popup.is_root();
        let target = match self.binder.menu_owner(menu) {
            Some(owner) if !is_root => FocusTarget::Widget(owner),
            _ => FocusTarget::Launcher,
        };
        let closed = if is_root && !popup.is_floating() {
            self.close_all();
            true
        } else {
            self.close_menu(menu, false)
        };
        if closed {
            self.focus = Some(target);
        }
        closed
    }

    fn focused_menu(&self) -> Option<MenuId> {
        match self.focus {
            Some(FocusTarget::Menu(menu)) => Some(menu),
            Some(FocusTarget::Widget(widget)) => self.binder.popup_of(widget),
            Some(FocusTarget::Launcher) => self.root_menu().filter(|menu| self.arena.is_open(*menu)),
            None => self.manager.active_menu(),
        }
    }

    fn focus_is_in(&self, menu: MenuId) -> bool {
        match self.focus {
            Some(FocusTarget::Menu(focused)) => focused == menu,
            Some(FocusTarget::Widget(widget)) => self.binder.popup_of(widget) == Some(menu),
            _ => false,
        }
    }

    fn navigable_items(&self, menu: MenuId) -> Vec<WidgetId> {
        let Some(owner) = self.binder.menu_owner(menu) else {
            return Vec::new();
        };
        self.binder
            .menu_items(owner)
            .into_iter()
            .filter(|item| self.binder.widget(*item).is_some_and(|widget| widget.is_navigable()))
            .collect()
    }

    fn focus_item(&mut self, menu: MenuId, item: WidgetId) {
        let previous = self.arena.get(menu).and_then(|popup| popup.active_item());
        if let Some(previous) = previous.filter(|previous| *previous != item) {
            let keeps_highlight = self
                .binder
                .widget(previous)
                .and_then(|widget| widget.menu)
                .is_some_and(|menu| self.arena.is_open(menu));
            if !keeps_highlight {
                self.binder.set_active(previous, false);
            }
        }
        self.binder.set_active(item, true);
        self.arena.set_active_item(menu, Some(item));
        self.focus = Some(FocusTarget::Widget(item));
    }

    fn focus_first(&mut self, menu: MenuId) {
        match self.navigable_items(menu).first().copied() {
            Some(item) => self.focus_item(menu, item),
            None => self.focus = Some(FocusTarget::Menu(menu)),
        }
    }

    fn is_docked_root(&self) -> bool {
        self.root_menu().is_some_and(|menu| !self.arena.is_floating(menu))
    }

    /// The top-level item whose popup contains `menu`, when the main menu is docked.
    fn top_level_launcher(&self, menu: MenuId) -> Option<WidgetId> {
        let root = self.root_menu().filter(|_| self.is_docked_root())?;
        let mut cursor = menu;
        while let Some(parent) = self.arena.top_menu(cursor) {
            if parent == root {
                return self.binder.menu_owner(cursor);
            }
            cursor = parent;
        }
        None
    }

    fn step_top_level(&mut self, tree: &MenuTree, current: Option<WidgetId>, forward: bool, open: bool) -> bool {
        let Some(root) = self.root_menu() else {
            return false;
        };
        let items = self.navigable_items(root);
        if items.is_empty() {
            return false;
        }
        let index = current.and_then(|current| items.iter().position(|item| *item == current));
        let next = match (index, forward) {
            (None, _) => 0,
            (Some(index), true) => (index + 1) % items.len(),
            (Some(index), false) => (index + items.len() - 1) % items.len(),
        };
        let item = items[next];
        let was_open = current
            .and_then(|current| self.binder.widget(current))
            .and_then(|widget| widget.menu)
            .is_some_and(|menu| self.arena.is_open(menu));

        self.focus_item(root, item);
        let submenu = self.binder.widget(item).and_then(|widget| widget.menu);
        if let Some(submenu) = submenu.filter(|_| open || was_open) {
            self.open_popup(tree, submenu, true);
            self.focus_first(submenu);
        }
        true
    }

    fn apply_root_settings(&mut self, menu: MenuId) {
        self.arena.show_box_pointer(menu, self.config.show_boxpointer);
        self.arena.fix_to_corner(menu, self.config.align_menu_launcher);
        self.arena.set_effect(menu, self.config.effect);
        self.arena.set_effect_time(menu, self.config.effect_duration());
    }
}

impl fmt::Debug for MenuView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuView")
            .field("tree_instance", &self.tree_instance)
            .field("widgets", &self.binder.len())
            .field("menus", &self.arena.len())
            .field("focus", &self.focus)
            .finish()
    }
}
