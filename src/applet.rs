//! The panel applet: a button showing the focused application and the menu behind it.

use std::fmt;

use appmenu_core::config::AppletConfig;
use appmenu_core::grab::{CoordinatorId, InputGrab};
use appmenu_core::model::MenuTree;
use appmenu_core::popup::keyboard::Key;
use appmenu_core::popup::{MenuId, Rect, Side};
use appmenu_core::registry::{AppIcon, WindowId, WindowRegistry};
use appmenu_core::signal::{Inbox, Subscription};
use appmenu_core::time::Clock;
use appmenu_core::view::{MenuView, ViewAction};
use appmenu_core::widget::WidgetId;
use appmenu_services::SettingsRegistry;
use log::{debug, info};

/// Icon height used when the panel does not scale its icons.
pub const FALLBACK_ICON_SIZE: u32 = 22;

/// Share of the panel height taken by a scaled icon.
pub const ICON_HEIGHT_FACTOR: f32 = 0.875;

/// Containers built per idle pass.
const IDLE_BUDGET: usize = 4;

/// Panel edge the applet sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelEdge {
    /// Along the top of the monitor.
    Top,
    /// Along the bottom of the monitor.
    #[default]
    Bottom,
    /// Along the left edge.
    Left,
    /// Along the right edge.
    Right,
}

impl PanelEdge {
    /// Arrow side of the main menu. A bottom panel opens its menu upwards.
    pub fn arrow_side(self) -> Side {
        match self {
            PanelEdge::Top => Side::Top,
            PanelEdge::Bottom => Side::Bottom,
            PanelEdge::Left => Side::Left,
            PanelEdge::Right => Side::Right,
        }
    }
}

/// How the panel sizes icons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelMetrics {
    /// Panel height in pixels.
    pub height: u32,
    /// Scale icons with the panel height.
    pub scale_icons: bool,
    /// Global UI scale factor.
    pub ui_scale: f32,
}

impl Default for PanelMetrics {
    fn default() -> Self {
        Self {
            height: 25,
            scale_icons: false,
            ui_scale: 1.0,
        }
    }
}

impl PanelMetrics {
    /// Application icon size for these metrics.
    pub fn icon_size(&self) -> u32 {
        if !self.scale_icons {
            return FALLBACK_ICON_SIZE;
        }
        let scale = if self.ui_scale > 0.0 { self.ui_scale } else { 1.0 };
        (self.height as f32 * ICON_HEIGHT_FACTOR / scale).round() as u32
    }
}

/// What the panel button displays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelButton {
    /// Application name, cut to the configured length. Empty when hidden.
    pub label: String,
    /// Application icon. `None` when hidden or unknown.
    pub icon: Option<AppIcon>,
    /// Draw the icon in grey.
    pub desaturate_icon: bool,
    /// Whether a menu is attached.
    pub has_menu: bool,
}

struct ShownMenu {
    window: WindowId,
    view: MenuView,
}

/// Keeps the panel button and the displayed menu in step with the [WindowRegistry].
pub struct AppletShell<C: Clock + Clone + 'static> {
    registry: WindowRegistry,
    config: AppletConfig,
    clock: C,
    grab: InputGrab,
    next_coordinator: u32,
    shown: Option<ShownMenu>,
    button: PanelButton,
    edge: PanelEdge,
    metrics: PanelMetrics,
    changes: Inbox<Option<WindowId>>,
    _subscription: Subscription,
}

impl<C: Clock + Clone + 'static> AppletShell<C> {
    /// Wrap `registry`. The registry's icon size is set from the default panel metrics.
    pub fn new(mut registry: WindowRegistry, config: AppletConfig, clock: C) -> Self {
        let (subscription, changes) = registry.appmenu_changed().queue();
        let metrics = PanelMetrics::default();
        registry.set_icon_size(metrics.icon_size());
        Self {
            registry,
            config,
            clock,
            grab: InputGrab::new(),
            next_coordinator: 1,
            shown: None,
            button: PanelButton::default(),
            edge: PanelEdge::default(),
            metrics,
            changes,
            _subscription: subscription,
        }
    }

    /// The registry.
    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    /// Mutable access to the registry, e.g. to forward registrar announcements.
    pub fn registry_mut(&mut self) -> &mut WindowRegistry {
        &mut self.registry
    }

    /// Current options.
    pub fn config(&self) -> &AppletConfig {
        &self.config
    }

    /// What the panel button shows.
    pub fn button(&self) -> &PanelButton {
        &self.button
    }

    /// The displayed menu.
    pub fn view(&self) -> Option<&MenuView> {
        self.shown.as_ref().map(|shown| &shown.view)
    }

    /// Window whose menu is displayed.
    pub fn shown_window(&self) -> Option<WindowId> {
        self.shown.as_ref().map(|shown| shown.window)
    }

    /// The displayed window's tree.
    pub fn tree(&self) -> Option<&MenuTree> {
        self.shown_window().and_then(|window| self.registry.menu_for_window(window))
    }

    /// Current panel metrics.
    pub fn metrics(&self) -> PanelMetrics {
        self.metrics
    }

    /// Shared input grab of every menu built by this applet.
    pub fn grab(&self) -> &InputGrab {
        &self.grab
    }

    /// Forward a focus change from the window manager.
    pub fn focus_changed(&mut self, window: Option<WindowId>) {
        self.registry.on_focus_changed(window);
        self.process_changes();
    }

    /// Run one event loop pass: apply resolver results and remote changes, then update the
    /// displayed menu.
    pub fn dispatch(&mut self) {
        self.registry.dispatch();
        self.process_changes();
        self.sync_view();
    }

    /// Advance transitions and timers. Returns whether a transition is still playing.
    pub fn tick(&mut self) -> bool {
        let playing = match self.shown.as_mut() {
            Some(shown) => shown.view.tick(),
            None => false,
        };
        self.flush_actions();
        playing
    }

    /// The panel button was clicked.
    pub fn button_press(&mut self, button: u32) -> bool {
        if button != 1 {
            return false;
        }
        let Some(shown) = self.shown.as_mut() else {
            return false;
        };
        let toggled = match self.registry.menu_for_window(shown.window) {
            Some(tree) => shown.view.forced_toggle(tree),
            None => false,
        };
        self.flush_actions();
        toggled
    }

    /// A menu item was clicked.
    pub fn activate(&mut self, widget: WidgetId) -> bool {
        self.with_view(|view, tree| view.activate(tree, widget)).unwrap_or(false)
    }

    /// The pointer moved onto an item, or off every item.
    pub fn hover(&mut self, widget: Option<WidgetId>) {
        self.with_view(|view, tree| view.hover(tree, widget));
    }

    /// Keyboard navigation inside the displayed menu.
    pub fn key_press(&mut self, key: Key) -> bool {
        self.with_view(|view, tree| view.key_press(tree, key)).unwrap_or(false)
    }

    /// The panel moved to another edge.
    pub fn set_panel_edge(&mut self, edge: PanelEdge, monitor: Rect, child_width: impl Fn(MenuId) -> f32) {
        self.edge = edge;
        if let Some(shown) = self.shown.as_mut() {
            shown.view.set_arrow_side(edge.arrow_side());
            if let Some(menu) = shown.view.root_menu() {
                shown.view.update_child_sides(menu, monitor, child_width);
            }
        }
    }

    /// The panel height or scale changed.
    pub fn set_panel_metrics(&mut self, metrics: PanelMetrics) {
        self.metrics = metrics;
        self.registry.set_icon_size(metrics.icon_size());
        self.process_changes();
    }

    /// Replace the options and apply them to the displayed menu.
    pub fn apply_config(&mut self, config: AppletConfig) {
        let enabling_auto_open = config.automatic_active_mainmenu && !self.config.automatic_active_mainmenu;
        self.config = config;
        if let Some(shown) = self.shown.as_mut() {
            shown.view.apply_config(&self.config);
            if enabling_auto_open {
                if let Some(menu) = shown.view.root_menu() {
                    shown.view.close_menu(menu, true);
                }
            }
        }
        let window = self.registry.last_focused();
        self.update_button(window.filter(|window| self.registry.app_for_window(*window).is_some()));
    }

    /// Re-read the settings files and apply what they now say.
    pub async fn reload_settings(&mut self, settings: &mut SettingsRegistry) -> anyhow::Result<()> {
        settings.reload_async().await?;
        self.apply_config(settings.applet_config());
        info!("Settings reloaded");
        Ok(())
    }

    /// Tear everything down. The shell is inert afterwards.
    pub fn destroy(&mut self) {
        self.hide_menu();
        self.registry.shutdown();
        self.button = PanelButton::default();
        info!("Applet removed");
    }

    fn with_view<R>(&mut self, f: impl FnOnce(&mut MenuView, &MenuTree) -> R) -> Option<R> {
        let window = self.shown_window()?;
        let tree = self.registry.menu_for_window(window)?;
        let shown = self.shown.as_mut()?;
        let result = f(&mut shown.view, tree);
        self.flush_actions();
        Some(result)
    }

    fn process_changes(&mut self) {
        // Only the latest announcement matters.
        if let Some(window) = self.changes.drain().pop() {
            self.appmenu_changed(window);
        }
    }

    fn appmenu_changed(&mut self, window: Option<WindowId>) {
        let window = window.filter(|window| self.registry.app_for_window(*window).is_some());
        self.update_button(window);

        let instance = window
            .and_then(|window| self.registry.menu_for_window(window))
            .map(MenuTree::instance);
        let unchanged = match (&self.shown, window, instance) {
            (Some(shown), Some(window), Some(instance)) => {
                shown.window == window && shown.view.tree_instance() == instance
            },
            (None, _, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        self.hide_menu();
        let coordinator = CoordinatorId(self.next_coordinator);
        let Some(window) = window else {
            return;
        };
        let Some(tree) = self.registry.menu_for_window(window) else {
            return;
        };
        self.next_coordinator += 1;
        let mut view = MenuView::new(
            tree,
            &self.config,
            self.grab.clone(),
            coordinator,
            Box::new(self.clock.clone()),
        );
        view.set_arrow_side(self.edge.arrow_side());
        if !self.config.floating_root() && self.config.automatic_active_mainmenu {
            view.open_root(tree, false);
        }
        debug!("Showing menu of window {window}");
        self.button.has_menu = true;
        self.shown = Some(ShownMenu { window, view });
        self.flush_actions();
    }

    fn update_button(&mut self, window: Option<WindowId>) {
        let app = window.and_then(|window| self.registry.app_for_window(window));
        self.button.label = match app {
            Some(app) if self.config.show_app_name => self.config.truncate_app_name(&app.name),
            _ => String::new(),
        };
        self.button.icon = match window {
            Some(window) if self.config.show_app_icon => self.registry.icon_for_window(window).cloned(),
            _ => None,
        };
        self.button.desaturate_icon = self.config.desaturate_app_icon;
    }

    fn hide_menu(&mut self) {
        if let Some(mut shown) = self.shown.take() {
            if let Some(menu) = shown.view.root_menu() {
                shown.view.close_menu(menu, true);
            }
            shown.view.shutdown();
        }
        self.button.has_menu = false;
    }

    fn sync_view(&mut self) {
        let Some(window) = self.shown_window() else {
            return;
        };
        let Some(tree) = self.registry.menu_for_window(window) else {
            self.hide_menu();
            return;
        };
        if let Some(shown) = self.shown.as_mut() {
            if shown.view.tree_instance() != tree.instance() {
                self.appmenu_changed(Some(window));
                return;
            }
            shown.view.sync(tree);
            shown.view.run_idle(tree, IDLE_BUDGET);
        }
        self.flush_actions();
    }

    fn flush_actions(&mut self) {
        let Some(shown) = self.shown.as_mut() else {
            return;
        };
        let window = shown.window;
        for action in shown.view.take_actions() {
            match action {
                ViewAction::Dispatch(node, event) => self.registry.send_event(window, node, event),
                ViewAction::AboutToShow(node) => self.registry.about_to_show(window, node),
            }
        }
    }
}

impl<C: Clock + Clone + 'static> fmt::Debug for AppletShell<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppletShell")
            .field("shown", &self.shown_window())
            .field("button", &self.button)
            .field("edge", &self.edge)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_size_follows_panel() {
        assert_eq!(PanelMetrics::default().icon_size(), FALLBACK_ICON_SIZE);
        let scaled = PanelMetrics {
            height: 32,
            scale_icons: true,
            ui_scale: 1.0,
        };
        assert_eq!(scaled.icon_size(), 28);
        let hidpi = PanelMetrics { ui_scale: 2.0, ..scaled };
        assert_eq!(hidpi.icon_size(), 14);
    }

    #[test]
    fn test_edges_map_to_arrow_sides() {
        assert_eq!(PanelEdge::Bottom.arrow_side(), Side::Bottom);
        assert_eq!(PanelEdge::Left.arrow_side(), Side::Left);
    }
}
