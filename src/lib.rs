#![warn(missing_docs)]

//! Global application menu for panels: mirrors the menus applications export over D-Bus and
//! shows the focused window's menu behind a panel button.

pub use appmenu_core as core;
#[cfg(feature = "dbus")]
pub use appmenu_dbus as dbus;
pub use appmenu_services as services;

/// Contains the [AppletShell](applet::AppletShell) panel controller.
pub mod applet;

/// Contains the [AppmenuService](service::AppmenuService) bus wiring.
#[cfg(feature = "dbus")]
pub mod service;

/// A "prelude" for users of the appmenu crates.
///
/// ```rust
/// use appmenu::prelude::*;
/// ```
pub mod prelude {
    pub use crate::applet::{AppletShell, PanelButton, PanelEdge, PanelMetrics};
    pub use crate::core::config::AppletConfig;
    pub use crate::core::model::{ItemProperties, MenuKind, MenuTree, NodeId};
    pub use crate::core::registry::{AppIcon, AppInfo, WindowId, WindowInfo, WindowRegistry, WindowTracker};
    pub use crate::core::resolver::{MenuLocator, MenuResolver};
    pub use crate::core::source::{ItemEvent, RemoteMenuSource};
    pub use crate::core::view::{MenuView, ViewAction};
    pub use crate::services::SettingsRegistry;

    #[cfg(feature = "dbus")]
    pub use crate::dbus::{Bridge, BridgeOptions, DbusResolver};
    #[cfg(feature = "dbus")]
    pub use crate::service::AppmenuService;
}
