//! Tracking which windows export a menu and which one is displayed.

use std::fmt;
use std::mem;

use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::error::{ProbeError, ResolveError};
use crate::model::{MenuTree, NodeId};
use crate::resolver::{MenuLocator, MenuResolver, ResolveRequest, ResolverEvent, Ticket};
use crate::signal::Emitter;
use crate::source::{AppMenu, ItemEvent, RemoteMenuSource};

/// X11 window id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application owning a window, as reported by the window tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Desktop file id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Themed icon name.
    pub icon_name: Option<String>,
}

/// A resolved application icon at a given size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIcon {
    /// Themed icon name.
    pub name: String,
    /// Size in pixels.
    pub size: u32,
}

/// A top-level window known to the window manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    /// Window id.
    pub id: WindowId,
    /// Owning application.
    pub app: Option<AppInfo>,
    /// GTK menu properties, if the window manager exposes them directly.
    pub gtk: Option<MenuLocator>,
}

impl WindowInfo {
    /// A window without application or menu information.
    pub fn new(id: WindowId) -> Self {
        Self { id, app: None, gtk: None }
    }
}

/// Window manager queries needed by the registry.
pub trait WindowTracker {
    /// All top-level windows across every workspace.
    fn windows(&self) -> Vec<WindowInfo>;

    /// The window holding keyboard focus.
    fn focused(&self) -> Option<WindowId>;

    /// Look up the icon of an application at the given size.
    fn icon_for(&self, app: &AppInfo, size: u32) -> Option<AppIcon>;
}

/// Resolution progress of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    /// Nothing requested yet, or the menu was torn down.
    Unresolved,
    /// Waiting for the window property probe.
    Probing,
    /// Waiting for the client to be built.
    Resolving,
    /// The last attempt failed. Retried on the next registration pass.
    Failed,
    /// A live menu is attached.
    Ready,
}

enum Resolution {
    Unresolved,
    Probing(Ticket),
    Resolving(Ticket),
    Failed,
    Ready(AppMenu),
}

impl Resolution {
    fn state(&self) -> MenuState {
        match self {
            Resolution::Unresolved => MenuState::Unresolved,
            Resolution::Probing(_) => MenuState::Probing,
            Resolution::Resolving(_) => MenuState::Resolving,
            Resolution::Failed => MenuState::Failed,
            Resolution::Ready(_) => MenuState::Ready,
        }
    }
}

struct WindowEntry {
    tracked: bool,
    application: Option<AppInfo>,
    locator: MenuLocator,
    icon: Option<AppIcon>,
    active: bool,
    resolution: Resolution,
}

impl WindowEntry {
    fn new() -> Self {
        Self {
            tracked: false,
            application: None,
            locator: MenuLocator::default(),
            icon: None,
            active: false,
            resolution: Resolution::Unresolved,
        }
    }

    fn menu(&self) -> Option<&AppMenu> {
        match &self.resolution {
            Resolution::Ready(menu) => Some(menu),
            _ => None,
        }
    }
}

/// Registry of windows that announced a menu.
///
/// The registry owns every [AppMenu]. It reacts to focus changes, registrations and window
/// list changes, and tells the applet through [WindowRegistry::appmenu_changed] which window's
/// menu should be displayed. Nothing here blocks: resolution is delegated to a [MenuResolver]
/// whose results are applied in [WindowRegistry::dispatch].
pub struct WindowRegistry {
    tracker: Box<dyn WindowTracker>,
    resolver: Box<dyn MenuResolver>,
    windows: IndexMap<WindowId, WindowEntry>,
    last: Option<WindowId>,
    icon_size: u32,
    next_ticket: u64,
    appmenu_changed: Emitter<Option<WindowId>>,
    window_unregistered: Emitter<WindowId>,
}

impl WindowRegistry {
    /// Creates an empty registry.
    pub fn new(tracker: Box<dyn WindowTracker>, resolver: Box<dyn MenuResolver>, icon_size: u32) -> Self {
        Self {
            tracker,
            resolver,
            windows: IndexMap::new(),
            last: None,
            icon_size,
            next_ticket: 0,
            appmenu_changed: Emitter::new(),
            window_unregistered: Emitter::new(),
        }
    }

    /// Fired whenever the displayed menu should change. Carries the focused window if it has an
    /// entry.
    pub fn appmenu_changed(&self) -> &Emitter<Option<WindowId>> {
        &self.appmenu_changed
    }

    /// Fired when a live menu is torn down.
    pub fn window_unregistered(&self) -> &Emitter<WindowId> {
        &self.window_unregistered
    }

    /// Register a window announced through the registrar interface.
    pub fn register(&mut self, window: WindowId, locator: MenuLocator) {
        self.register_window(window, None, &locator);
    }

    /// Tear down a window's menu on request of the application.
    ///
    /// The entry is kept, but its locator is forgotten so that a later registration starts over.
    pub fn unregister(&mut self, window: WindowId) {
        self.destroy_menu(window, true);
    }

    /// React to a focus change.
    pub fn on_focus_changed(&mut self, window: Option<WindowId>) {
        if let Some(window) = window {
            let has_menu = self
                .windows
                .get(&window)
                .map(|entry| entry.menu().is_some())
                .unwrap_or(false);
            if !has_menu {
                self.register_all_windows();
            }
        }

        for (id, entry) in self.windows.iter_mut() {
            entry.active = Some(*id) == window;
        }
        self.last = window;

        let shown = window.filter(|window| self.windows.contains_key(window));
        self.appmenu_changed.emit(&shown);
    }

    /// Register every window the tracker knows about.
    pub fn register_all_windows(&mut self) {
        for info in self.tracker.windows() {
            let locator = info.gtk.clone().unwrap_or_default();
            self.register_window(info.id, Some(&info), &locator);
        }
    }

    /// Drop entries of windows that no longer exist.
    pub fn refresh_windows(&mut self) {
        let current: Vec<WindowId> = self.tracker.windows().into_iter().map(|info| info.id).collect();
        let gone: Vec<WindowId> = self
            .windows
            .keys()
            .filter(|id| !current.contains(id))
            .copied()
            .collect();

        for window in gone {
            self.destroy_menu(window, false);
            self.resolver.cancel(window);
            self.windows.shift_remove(&window);
            debug!("Forgot window {window}");
        }
    }

    /// Apply resolver completions and pending remote changes.
    pub fn dispatch(&mut self) {
        for event in self.resolver.poll() {
            match event {
                ResolverEvent::Resolved(window, ticket, result) => self.on_resolved(window, ticket, result),
                ResolverEvent::Probed(window, ticket, result) => self.on_probed(window, ticket, result),
            }
        }

        let mut collapsed = Vec::new();
        for (window, entry) in self.windows.iter_mut() {
            if let Resolution::Ready(menu) = &mut entry.resolution {
                let outcome = menu.pump();
                let tree = menu.tree();
                if outcome.collapsed && (tree.is_destroyed() || tree.children(tree.root()).is_empty()) {
                    collapsed.push(*window);
                }
            }
        }
        for window in collapsed {
            info!("Menu of window {window} went away");
            self.destroy_menu(window, false);
        }
    }

    /// The live menu of a window.
    pub fn menu_for_window(&self, window: WindowId) -> Option<&MenuTree> {
        self.windows
            .get(&window)
            .and_then(WindowEntry::menu)
            .map(AppMenu::tree)
    }

    /// The application owning a window.
    pub fn app_for_window(&self, window: WindowId) -> Option<&AppInfo> {
        self.windows.get(&window).and_then(|entry| entry.application.as_ref())
    }

    /// The cached application icon of a window.
    pub fn icon_for_window(&self, window: WindowId) -> Option<&AppIcon> {
        self.windows.get(&window).and_then(|entry| entry.icon.as_ref())
    }

    /// Ask the application to refresh its top level menu.
    pub fn update_menu_for_window(&self, window: WindowId) {
        if let Some(menu) = self.windows.get(&window).and_then(WindowEntry::menu) {
            menu.about_to_show(menu.root());
        }
    }

    /// Ask the application to refresh a submenu.
    pub fn about_to_show(&self, window: WindowId, id: NodeId) {
        if let Some(menu) = self.windows.get(&window).and_then(WindowEntry::menu) {
            menu.about_to_show(id);
        }
    }

    /// Report an item event to a window's application.
    pub fn send_event(&self, window: WindowId, id: NodeId, event: ItemEvent) {
        if let Some(menu) = self.windows.get(&window).and_then(WindowEntry::menu) {
            menu.send_event(id, event);
        }
    }

    /// Change the icon size, refresh every cached icon and re-announce the current window.
    pub fn set_icon_size(&mut self, size: u32) {
        if self.icon_size == size {
            return;
        }
        self.icon_size = size;
        let ids: Vec<WindowId> = self.windows.keys().copied().collect();
        for window in ids {
            self.update_icon(window);
        }
        if let Some(last) = self.last {
            let shown = Some(last).filter(|window| self.windows.contains_key(window));
            self.appmenu_changed.emit(&shown);
        }
    }

    /// Current icon size.
    pub fn icon_size(&self) -> u32 {
        self.icon_size
    }

    /// Resolution progress of a window.
    pub fn menu_state(&self, window: WindowId) -> Option<MenuState> {
        self.windows.get(&window).map(|entry| entry.resolution.state())
    }

    /// Everything known about where a window's menu lives.
    pub fn locator(&self, window: WindowId) -> Option<&MenuLocator> {
        self.windows.get(&window).map(|entry| &entry.locator)
    }

    /// Whether the window's menu is the displayed one.
    pub fn is_active(&self, window: WindowId) -> bool {
        self.windows.get(&window).map(|entry| entry.active).unwrap_or(false)
    }

    /// The window that had focus most recently.
    pub fn last_focused(&self) -> Option<WindowId> {
        self.last
    }

    /// Windows with an entry, in registration order.
    pub fn windows(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.windows.keys().copied()
    }

    /// Drop every entry and abandon outstanding resolution work.
    pub fn shutdown(&mut self) {
        for window in self.windows.keys() {
            self.resolver.cancel(*window);
        }
        self.windows.clear();
        self.last = None;
    }

    fn register_window(&mut self, window: WindowId, info: Option<&WindowInfo>, locator: &MenuLocator) {
        let entry = self.windows.entry(window).or_insert_with(WindowEntry::new);
        if let Some(info) = info {
            entry.tracked = true;
            if entry.application.is_none() {
                entry.application = info.app.clone();
            }
        }
        entry.locator.merge_from(locator);
        self.try_resolve(window);
    }

    fn try_resolve(&mut self, window: WindowId) {
        self.update_icon(window);
        let Some(entry) = self.windows.get_mut(&window) else {
            return;
        };

        match entry.resolution {
            Resolution::Ready(_) | Resolution::Resolving(_) => {},
            Resolution::Probing(_) if entry.locator.is_resolvable() => {
                self.resolver.cancel(window);
                let ticket = Self::issue(&mut self.next_ticket);
                Self::start_resolve(self.resolver.as_mut(), window, ticket, entry);
            },
            Resolution::Probing(_) => {},
            Resolution::Unresolved | Resolution::Failed => {
                let ticket = Self::issue(&mut self.next_ticket);
                if entry.locator.is_resolvable() {
                    Self::start_resolve(self.resolver.as_mut(), window, ticket, entry);
                } else {
                    entry.resolution = Resolution::Probing(ticket);
                    self.resolver.probe(window, ticket);
                }
            },
        }
    }

    fn issue(next: &mut u64) -> Ticket {
        *next += 1;
        Ticket(*next)
    }

    fn start_resolve(resolver: &mut dyn MenuResolver, window: WindowId, ticket: Ticket, entry: &mut WindowEntry) {
        entry.resolution = Resolution::Resolving(ticket);
        resolver.resolve(ResolveRequest {
            window,
            ticket,
            locator: entry.locator.clone(),
        });
    }

    fn on_resolved(
        &mut self,
        window: WindowId,
        ticket: Ticket,
        result: Result<Box<dyn RemoteMenuSource>, ResolveError>,
    ) {
        let Some(entry) = self.windows.get_mut(&window) else {
            debug!("Dropping menu of forgotten window {window}");
            return;
        };
        if !matches!(entry.resolution, Resolution::Resolving(current) if current == ticket) {
            debug!("Dropping stale menu of window {window} ({ticket:?})");
            return;
        }

        match result {
            Ok(source) => {
                info!("Creating menu on {}", source.describe());
                entry.resolution = Resolution::Ready(AppMenu::new(source));
                let tracked = entry.tracked;

                if !tracked {
                    self.register_all_windows();
                }
                if self.tracker.focused() == Some(window) {
                    self.on_focus_changed(Some(window));
                }
            },
            Err(err) => {
                warn!("No menu for window {window}: {err}");
                entry.resolution = Resolution::Failed;
            },
        }
    }

    fn on_probed(&mut self, window: WindowId, ticket: Ticket, result: Result<MenuLocator, ProbeError>) {
        let Some(entry) = self.windows.get_mut(&window) else {
            return;
        };
        if !matches!(entry.resolution, Resolution::Probing(current) if current == ticket) {
            debug!("Ignoring stale probe of window {window} ({ticket:?})");
            return;
        }

        match result {
            Ok(locator) => {
                entry.locator.merge_from(&locator);
                if entry.locator.is_resolvable() {
                    let ticket = Self::issue(&mut self.next_ticket);
                    Self::start_resolve(self.resolver.as_mut(), window, ticket, entry);
                } else {
                    debug!("Window {window} exports no menu");
                    entry.resolution = Resolution::Failed;
                }
            },
            Err(err) => {
                debug!("Window {window} exports no menu: {err}");
                entry.resolution = Resolution::Failed;
            },
        }
    }

    fn destroy_menu(&mut self, window: WindowId, forget_locator: bool) {
        let Some(entry) = self.windows.get_mut(&window) else {
            return;
        };
        if matches!(entry.resolution, Resolution::Probing(_) | Resolution::Resolving(_)) {
            self.resolver.cancel(window);
        }
        if forget_locator {
            entry.locator = MenuLocator::default();
        }

        let previous = mem::replace(&mut entry.resolution, Resolution::Unresolved);
        if let Resolution::Ready(menu) = previous {
            info!("Unregistering menu of window {window} ({})", menu.describe());
            drop(menu);
            self.window_unregistered.emit(&window);
        }
        // The entry outlives its menu, so the focused window is still announced. Observers see
        // the teardown as `menu_for_window` returning `None`, and keep the application label.
        if self.last == Some(window) {
            self.appmenu_changed.emit(&Some(window));
        }
    }

    fn update_icon(&mut self, window: WindowId) {
        let size = self.icon_size;
        if let Some(entry) = self.windows.get_mut(&window) {
            entry.icon = entry
                .application
                .as_ref()
                .and_then(|app| self.tracker.icon_for(app, size));
        }
    }
}

impl fmt::Debug for WindowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowRegistry")
            .field("windows", &self.windows.len())
            .field("last", &self.last)
            .field("icon_size", &self.icon_size)
            .finish()
    }
}
