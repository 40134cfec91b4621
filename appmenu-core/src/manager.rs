//! Coordination of the popups sharing one input grab.

use std::time::{Duration, Instant};

use indexmap::IndexSet;
use log::{debug, warn};

use crate::grab::{CoordinatorId, InputGrab};
use crate::popup::{Effect, MenuId, PopupArena, PopupSignal, DEFAULT_EFFECT_TIME};
use crate::time::Debounce;

/// Delay between leaving a launcher and checking whether its popup should close.
pub const LEAVE_DELAY: Duration = Duration::from_millis(50);

/// Appearance applied to every managed popup except the main menu.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuSettings {
    /// Floating or docked submenus.
    pub floating: bool,
    /// Draw the arrow.
    pub show_box_pointer: bool,
    /// Align submenus to the corner of their launcher.
    pub fix_to_corner: bool,
    /// Open and close transition.
    pub effect: Effect,
    /// Transition length.
    pub effect_time: Duration,
}

impl Default for MenuSettings {
    fn default() -> Self {
        Self {
            floating: true,
            show_box_pointer: true,
            fix_to_corner: false,
            effect: Effect::None,
            effect_time: DEFAULT_EFFECT_TIME,
        }
    }
}

/// Kinds of input events seen by [MenuManager::capture_event].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturedEvent {
    /// A pointer button went down.
    ButtonPress,
    /// A pointer button was released.
    ButtonRelease,
    /// The pointer moved.
    Motion,
    /// Wheel or touchpad scrolling.
    Scroll,
    /// A key press.
    Key,
}

/// What to do with a captured event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// Hand the event to the menu under it.
    Deliver,
    /// Swallow the event.
    Block,
    /// Let the event continue to whatever is under it.
    Propagate,
}

/// Arbiter of the popups of one menu tree.
///
/// The manager keeps the active chain: the open floating popups from the outermost to the
/// innermost. It takes the input grab when the chain gains its first popup and gives it back
/// once the chain is empty.
#[derive(Debug)]
pub struct MenuManager {
    id: CoordinatorId,
    grab: InputGrab,
    managed: IndexSet<MenuId>,
    chain: Vec<MenuId>,
    last_closed: Option<MenuId>,
    open_on_hover: bool,
    close_on_hover: bool,
    leave: Debounce,
    leave_menu: Option<MenuId>,
    settings: MenuSettings,
}

impl MenuManager {
    /// Creates a manager sharing `grab` with the other managers of the process.
    pub fn new(id: CoordinatorId, grab: InputGrab, settings: MenuSettings) -> Self {
        Self {
            id,
            grab,
            managed: IndexSet::new(),
            chain: Vec::new(),
            last_closed: None,
            open_on_hover: false,
            close_on_hover: false,
            leave: Debounce::new(LEAVE_DELAY),
            leave_menu: None,
            settings,
        }
    }

    /// Coordinator id.
    pub fn id(&self) -> CoordinatorId {
        self.id
    }

    /// Start managing a popup and its child popups.
    ///
    /// Everything but a main menu takes the manager's [MenuSettings]. Returns false when the
    /// popup is unknown or already managed.
    pub fn add_menu(&mut self, arena: &mut PopupArena, menu: MenuId, now: Instant) -> bool {
        let Some(popup) = arena.get(menu) else {
            return false;
        };
        let is_root = popup.is_root();
        let children = popup.children().to_vec();
        if !self.managed.insert(menu) {
            return false;
        }

        if !is_root {
            self.apply_settings_to(arena, menu, now);
        }
        for child in children {
            self.add_menu(arena, child, now);
        }
        true
    }

    /// Stop managing a popup. The grab is released when the chain ends up empty.
    pub fn remove_menu(&mut self, menu: MenuId) -> bool {
        if !self.managed.shift_remove(&menu) {
            return false;
        }
        if let Some(position) = self.chain.iter().position(|open| *open == menu) {
            self.chain.truncate(position);
        }
        if self.leave_menu == Some(menu) {
            self.leave.cancel();
            self.leave_menu = None;
        }
        if self.last_closed == Some(menu) {
            self.last_closed = None;
        }
        if self.chain.is_empty() {
            self.release_grab();
        }
        true
    }

    /// Follow one popup signal.
    pub fn handle_signal(&mut self, arena: &mut PopupArena, signal: PopupSignal, now: Instant) {
        match signal {
            PopupSignal::OpenStateChanged(menu, true) => {
                if !self.managed.contains(&menu) || !arena.is_floating(menu) {
                    return;
                }
                if self.chain.contains(&menu) {
                    return;
                }
                // Keep only the popups the new one hangs from.
                let mut ancestors = Vec::new();
                let mut cursor = arena.top_menu(menu);
                while let Some(parent) = cursor {
                    ancestors.push(parent);
                    cursor = arena.top_menu(parent);
                }
                self.chain.retain(|open| ancestors.contains(open));
                if self.chain.is_empty() && !self.grab.acquire(self.id) {
                    warn!("Opened {menu} without the input grab");
                }
                self.chain.push(menu);
                self.last_closed = None;
            },
            PopupSignal::OpenStateChanged(menu, false) => {
                if let Some(position) = self.chain.iter().position(|open| *open == menu) {
                    self.chain.truncate(position);
                    self.last_closed = Some(menu);
                }
                if self.chain.is_empty() {
                    self.release_grab();
                }
            },
            PopupSignal::ChildMenuAdded(parent, child) => {
                if self.managed.contains(&parent) {
                    self.add_menu(arena, child, now);
                }
            },
            PopupSignal::ChildMenuRemoved(..) => {},
            PopupSignal::Destroyed(menu) => {
                self.remove_menu(menu);
            },
        }
    }

    /// The pointer entered the launcher of `menu`.
    ///
    /// Returns the popup the caller should open. Before returning a popup outside the active
    /// chain, the part of the chain that does not contain its launcher is closed.
    pub fn source_enter(&mut self, arena: &mut PopupArena, menu: MenuId, now: Instant) -> Option<MenuId> {
        if self.leave_menu == Some(menu) {
            self.leave.cancel();
            self.leave_menu = None;
        }
        if !self.open_on_hover || !self.managed.contains(&menu) {
            return None;
        }

        let active = self.active_menu();
        if let Some(active) = active.filter(|active| arena.is_child_menu(*active, menu)) {
            if arena.is_open(menu) || self.last_closed == Some(menu) {
                return None;
            }
            debug!("Hover opens {menu} below {active}");
            return Some(menu);
        }

        if !arena.is_floating(menu) || !self.should_act(arena, menu) {
            return None;
        }
        if !self.close_on_hover {
            return None;
        }
        self.change_menu(arena, menu, now);
        Some(menu)
    }

    /// The pointer left the launcher of `menu`. Arms the leave timer.
    pub fn source_leave(&mut self, menu: MenuId, now: Instant) {
        if self.last_closed == Some(menu) {
            self.last_closed = None;
        }
        if !self.close_on_hover {
            return;
        }
        self.leave_menu = Some(menu);
        self.leave.schedule(now);
    }

    /// Run the leave timer. `hovered` is the popup under the pointer, if any.
    ///
    /// Closes the popup whose launcher was left when it is still the innermost open popup and
    /// the pointer is not over the active chain.
    pub fn tick(&mut self, arena: &mut PopupArena, now: Instant, hovered: Option<MenuId>) {
        if self.leave.fire(now).is_none() {
            return;
        }
        let Some(menu) = self.leave_menu.take() else {
            return;
        };
        if self.active_menu() != Some(menu) || !arena.is_open(menu) {
            return;
        }
        if hovered.is_some_and(|hovered| self.chain.contains(&hovered)) {
            return;
        }
        debug!("Pointer left {menu}, closing it");
        arena.close(menu, true, false, now);
    }

    /// Close the whole active chain.
    pub fn close_all(&mut self, arena: &mut PopupArena, now: Instant) {
        if let Some(first) = self.chain.first().copied() {
            arena.close(first, true, false, now);
        }
        self.leave.cancel();
        self.leave_menu = None;
    }

    /// Decide what happens to an event captured while the grab may be held. `inside` tells
    /// whether the event happened over a popup of the active chain.
    pub fn capture_event(
        &mut self,
        arena: &mut PopupArena,
        event: CapturedEvent,
        inside: bool,
        now: Instant,
    ) -> EventDisposition {
        if !self.is_grabbed() {
            return EventDisposition::Propagate;
        }
        if inside || event == CapturedEvent::Key {
            return EventDisposition::Deliver;
        }
        match event {
            CapturedEvent::ButtonPress | CapturedEvent::ButtonRelease => {
                self.close_all(arena, now);
                EventDisposition::Propagate
            },
            _ => EventDisposition::Block,
        }
    }

    /// Change the hover policies.
    pub fn set_hover_policy(&mut self, open_on_hover: bool, close_on_hover: bool) {
        self.open_on_hover = open_on_hover;
        self.close_on_hover = close_on_hover;
        if !close_on_hover {
            self.leave.cancel();
            self.leave_menu = None;
        }
    }

    /// Replace the settings and re-apply them to the managed popups.
    pub fn set_settings(&mut self, arena: &mut PopupArena, settings: MenuSettings, now: Instant) {
        self.settings = settings;
        let managed: Vec<MenuId> = self.managed.iter().copied().collect();
        for menu in managed {
            if arena.get(menu).is_some_and(|popup| !popup.is_root()) {
                self.apply_settings_to(arena, menu, now);
            }
        }
    }

    /// Innermost open popup.
    pub fn active_menu(&self) -> Option<MenuId> {
        self.chain.last().copied()
    }

    /// The active chain, outermost first.
    pub fn chain(&self) -> &[MenuId] {
        &self.chain
    }

    /// Whether `menu` is part of the active chain.
    pub fn chain_contains(&self, menu: MenuId) -> bool {
        self.chain.contains(&menu)
    }

    /// Whether this manager holds the input grab.
    pub fn is_grabbed(&self) -> bool {
        self.grab.is_held_by(self.id)
    }

    /// Whether the popup is managed.
    pub fn contains(&self, menu: MenuId) -> bool {
        self.managed.contains(&menu)
    }

    /// Number of managed popups.
    pub fn len(&self) -> usize {
        self.managed.len()
    }

    /// Whether nothing is managed.
    pub fn is_empty(&self) -> bool {
        self.managed.is_empty()
    }

    /// Current settings.
    pub fn settings(&self) -> MenuSettings {
        self.settings
    }

    /// Current hover policies as `(open_on_hover, close_on_hover)`.
    pub fn hover_policy(&self) -> (bool, bool) {
        (self.open_on_hover, self.close_on_hover)
    }

    fn should_act(&self, arena: &PopupArena, menu: MenuId) -> bool {
        if !self.is_grabbed() {
            return false;
        }
        if self
            .active_menu()
            .is_some_and(|active| arena.is_child_menu(active, menu))
        {
            return false;
        }
        !self.chain.contains(&menu)
    }

    fn change_menu(&mut self, arena: &mut PopupArena, menu: MenuId, now: Instant) {
        let parent = arena.top_menu(menu);
        let keep = parent
            .and_then(|parent| self.chain.iter().position(|open| *open == parent))
            .map(|position| position + 1)
            .unwrap_or(0);
        if let Some(first_closed) = self.chain.get(keep).copied() {
            debug!("Switching from {first_closed} to {menu}");
            arena.close(first_closed, false, true, now);
        }
    }

    fn apply_settings_to(&self, arena: &mut PopupArena, menu: MenuId, now: Instant) {
        let settings = self.settings;
        if arena.is_floating(menu) != settings.floating {
            arena.set_floating(menu, settings.floating, now);
        }
        arena.show_box_pointer(menu, settings.show_box_pointer);
        arena.fix_to_corner(menu, settings.fix_to_corner);
        arena.set_effect(menu, settings.effect);
        arena.set_effect_time(menu, settings.effect_time);
    }

    fn release_grab(&mut self) {
        if self.grab.release(self.id) {
            debug!("Coordinator {:?} released the input grab", self.id);
        }
    }
}
