//! Runs an [AppletShell] against the session bus.

use std::rc::Rc;

use anyhow::Result;
use appmenu_core::registry::{WindowId, WindowRegistry, WindowTracker};
use appmenu_core::signal::{Inbox, Subscription};
use appmenu_core::time::SystemClock;
use appmenu_dbus::{Bridge, BridgeOptions, DbusResolver, RegistrarEvent};
use appmenu_services::{Activation, SettingsRegistry, SystemProperties};
use log::{info, warn};

use crate::applet::AppletShell;

/// Shown once when the GTK module only takes effect for applications started later.
pub const RESTART_NOTICE: &str =
    "The GTK menu export was just enabled. Applications started before now will not show their menus.";

/// The applet wired to a [Bridge], plus the desktop integration it switched on.
pub struct AppmenuService {
    bridge: Rc<Bridge>,
    shell: AppletShell<SystemClock>,
    system: SystemProperties,
    unregistered: Inbox<WindowId>,
    _subscription: Subscription,
    notice: Option<&'static str>,
}

impl AppmenuService {
    /// Connect to the session bus and register every window `tracker` already knows.
    pub fn start(settings: &SettingsRegistry, tracker: Box<dyn WindowTracker>, options: BridgeOptions) -> Result<Self> {
        let bridge = Rc::new(Bridge::start(options)?);
        let resolver = DbusResolver::new(bridge.clone());
        let mut registry = WindowRegistry::new(tracker, Box::new(resolver), 0);
        let (subscription, unregistered) = registry.window_unregistered().queue();
        registry.register_all_windows();

        Ok(Self {
            bridge,
            shell: AppletShell::new(registry, settings.applet_config(), SystemClock),
            system: SystemProperties::session(),
            unregistered,
            _subscription: subscription,
            notice: None,
        })
    }

    /// Switch on the GTK menu export.
    pub async fn integrate_system(&mut self) -> Result<()> {
        if self.system.enable().await? == Activation::NeedsRestart {
            warn!("{RESTART_NOTICE}");
            self.notice = Some(RESTART_NOTICE);
        }
        Ok(())
    }

    /// Re-read `settings` from disk and hand the result to the applet.
    pub async fn reload_settings(&mut self, settings: &mut SettingsRegistry) -> Result<()> {
        self.shell.reload_settings(settings).await
    }

    /// The pending user notification, if any. Returned once.
    pub fn take_notice(&mut self) -> Option<&'static str> {
        self.notice.take()
    }

    /// The applet.
    pub fn shell(&self) -> &AppletShell<SystemClock> {
        &self.shell
    }

    /// Mutable access to the applet, for input and panel changes.
    pub fn shell_mut(&mut self) -> &mut AppletShell<SystemClock> {
        &mut self.shell
    }

    /// One pass of the main loop. Returns whether a transition is still playing.
    pub fn pump(&mut self) -> bool {
        for event in self.bridge.take_registrar_events() {
            match event {
                RegistrarEvent::Registered { window, locator } => self.shell.registry_mut().register(window, locator),
                RegistrarEvent::Unregistered(window) => self.shell.registry_mut().unregister(window),
            }
        }

        self.shell.dispatch();
        for window in self.unregistered.drain() {
            if let Err(err) = self.bridge.emit_unregistered(window) {
                warn!("Cannot announce removal of {window}: {err}");
            }
        }
        self.shell.tick()
    }

    /// Tear down the applet and undo the desktop integration.
    pub async fn shutdown(mut self) -> Result<()> {
        self.shell.destroy();
        if self.system.is_enabled() {
            self.system.disable().await?;
        }
        info!("Appmenu service stopped");
        Ok(())
    }
}

impl std::fmt::Debug for AppmenuService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppmenuService")
            .field("shell", &self.shell)
            .field("system", &self.system)
            .finish()
    }
}
