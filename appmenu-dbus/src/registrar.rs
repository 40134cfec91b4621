// SPDX-License-Identifier: LGPL-3.0-only
//! AppMenu registrar service.
//!
//! Applications exporting a dbusmenu call `RegisterWindow` with the X11 window id and the menu
//! object path. The caller's unique name becomes the menu sender.

use std::sync::mpsc::Sender;

use appmenu_core::registry::WindowId;
use appmenu_core::resolver::MenuLocator;
use indexmap::IndexMap;
use log::{debug, info};
use zbus::interface;
use zbus::message::Header;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{ObjectPath, OwnedObjectPath};

/// Well-known name of the registrar.
pub const REGISTRAR_BUS: &str = "com.canonical.AppMenu.Registrar";
/// Object path of the registrar.
pub const REGISTRAR_PATH: &str = "/com/canonical/AppMenu/Registrar";

/// Announcements received by the registrar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrarEvent {
    /// A window announced its dbusmenu.
    Registered {
        /// Window id.
        window: WindowId,
        /// Sender and menu path taken from the call.
        locator: MenuLocator,
    },
    /// The window withdrew its menu.
    Unregistered(WindowId),
}

/// Registered windows in registration order.
#[derive(Debug, Default, Clone)]
pub struct WindowTable {
    windows: IndexMap<u32, (String, OwnedObjectPath)>,
}

impl WindowTable {
    /// Record or replace a window's menu.
    pub fn insert(&mut self, window: u32, sender: impl Into<String>, path: OwnedObjectPath) {
        self.windows.insert(window, (sender.into(), path));
    }

    /// Forget a window. Returns whether it was known.
    pub fn remove(&mut self, window: u32) -> bool {
        self.windows.shift_remove(&window).is_some()
    }

    /// Sender and path for `window`, `("", "/")` when unknown.
    pub fn lookup(&self, window: u32) -> (String, OwnedObjectPath) {
        self.windows.get(&window).cloned().unwrap_or_else(|| {
            (
                String::new(),
                ObjectPath::from_static_str_unchecked("/").into(),
            )
        })
    }

    /// Every registered window.
    pub fn all(&self) -> Vec<(u32, String, OwnedObjectPath)> {
        self.windows
            .iter()
            .map(|(window, (sender, path))| (*window, sender.clone(), path.clone()))
            .collect()
    }

    /// Number of registered windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no window is registered.
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// The `com.canonical.AppMenu.Registrar` object.
pub struct Registrar {
    table: WindowTable,
    events: Sender<RegistrarEvent>,
}

impl Registrar {
    /// A registrar forwarding announcements to `events`.
    pub fn new(events: Sender<RegistrarEvent>) -> Self {
        Self {
            table: WindowTable::default(),
            events,
        }
    }

    /// Drop a window that went away without unregistering. Returns whether it was known.
    pub fn forget(&mut self, window: WindowId) -> bool {
        self.table.remove(window.0)
    }

    fn notify(&self, event: RegistrarEvent) {
        if self.events.send(event).is_err() {
            debug!("Registrar event receiver is gone");
        }
    }
}

#[interface(name = "com.canonical.AppMenu.Registrar")]
impl Registrar {
    async fn register_window(
        &mut self,
        window_id: u32,
        menu_object_path: OwnedObjectPath,
        #[zbus(header)] header: Header<'_>,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<()> {
        let Some(sender) = header.sender().map(|sender| sender.to_string()) else {
            return Err(zbus::fdo::Error::InvalidArgs("RegisterWindow without a sender".to_string()));
        };
        info!("Window {window_id} registered menu {sender}{}", menu_object_path.as_str());
        self.table.insert(window_id, sender.clone(), menu_object_path.clone());
        self.notify(RegistrarEvent::Registered {
            window: WindowId(window_id),
            locator: MenuLocator::dbusmenu(sender.clone(), menu_object_path.as_str()),
        });
        if let Err(err) = Self::window_registered(&emitter, window_id, &sender, menu_object_path.clone().into_inner()).await {
            debug!("Failed to emit WindowRegistered: {err}");
        }
        Ok(())
    }

    async fn unregister_window(
        &mut self,
        window_id: u32,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) {
        if !self.table.remove(window_id) {
            debug!("UnregisterWindow for unknown window {window_id}");
        }
        self.notify(RegistrarEvent::Unregistered(WindowId(window_id)));
        if let Err(err) = Self::window_unregistered(&emitter, window_id).await {
            debug!("Failed to emit WindowUnregistered: {err}");
        }
    }

    async fn get_menu_for_window(&self, window_id: u32) -> (String, OwnedObjectPath) {
        self.table.lookup(window_id)
    }

    async fn get_menus(&self) -> Vec<(u32, String, OwnedObjectPath)> {
        self.table.all()
    }

    #[zbus(signal)]
    pub async fn window_registered(
        emitter: &SignalEmitter<'_>,
        window_id: u32,
        service: &str,
        path: ObjectPath<'_>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    pub async fn window_unregistered(emitter: &SignalEmitter<'_>, window_id: u32) -> zbus::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn path(path: &str) -> OwnedObjectPath {
        OwnedObjectPath::try_from(path).unwrap()
    }

    #[test]
    fn test_unknown_window_maps_to_empty_menu() {
        let table = WindowTable::default();
        let (sender, menu) = table.lookup(42);
        assert_eq!(sender, "");
        assert_eq!(menu.as_str(), "/");
    }

    #[test]
    fn test_table_keeps_registration_order() {
        let mut table = WindowTable::default();
        table.insert(3, ":1.7", path("/MenuBar/1"));
        table.insert(1, ":1.9", path("/com/canonical/menu/1"));
        table.insert(3, ":1.7", path("/MenuBar/2"));

        let all = table.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, 3);
        assert_eq!(all[0].2.as_str(), "/MenuBar/2");
        assert_eq!(table.lookup(1).0, ":1.9");

        assert!(table.remove(3));
        assert!(!table.remove(3));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_forget_drops_window() {
        let (events, _rx) = mpsc::channel();
        let mut registrar = Registrar::new(events);
        registrar.table.insert(5, ":1.2", path("/menu"));
        assert!(registrar.forget(WindowId(5)));
        assert!(registrar.table.is_empty());
    }
}
