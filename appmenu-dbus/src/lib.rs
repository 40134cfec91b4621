#![warn(missing_docs)]

//! DBus menu clients and AppMenu registrar for appmenu => See `appmenu` crate.
//!
//! Everything that talks to the bus lives on one background thread running a tokio runtime.
//! The single threaded core only sees [DbusResolver](resolver::DbusResolver), the
//! [RemoteClient](client::RemoteClient) sources it hands out and the registrar events.

use appmenu_core::error::ResolveError;
use thiserror::Error;

/// Contains the dbusmenu item property decoding.
pub mod properties;

/// Contains the [LayoutMirror](mirror::LayoutMirror) turning layouts into source changes.
pub mod mirror;

/// Contains the [RemoteClient](client::RemoteClient) source.
pub mod client;

/// Contains the `com.canonical.dbusmenu` client.
pub mod dbusmenu;

/// Contains the `org.gtk.Menus` / `org.gtk.Actions` client.
pub mod gtk;

/// Contains the window property probe.
pub mod probe;

/// Contains the background [Bridge](bridge::Bridge) thread.
pub mod bridge;

/// Contains the [DbusResolver](resolver::DbusResolver).
pub mod resolver;

/// Contains the `com.canonical.AppMenu.Registrar` service.
pub mod registrar;

pub use bridge::{Bridge, BridgeOptions, Reply};
pub use registrar::RegistrarEvent;
pub use resolver::DbusResolver;

/// Errors of the DBus layer.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport or protocol failure.
    #[error("D-Bus error: {0}")]
    Zbus(#[from] zbus::Error),
    /// The remote method returned an error.
    #[error("D-Bus method error: {0}")]
    Fdo(#[from] zbus::fdo::Error),
    /// A value did not have the expected type.
    #[error("variant error: {0}")]
    Variant(#[from] zvariant::Error),
    /// Thread or process I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The remote menu declares an unsupported version.
    #[error("incompatible dbusmenu version {0}")]
    IncompatibleVersion(u32),
    /// A layout did not have the `(ia{sv}av)` shape.
    #[error("malformed layout: {0}")]
    Layout(&'static str),
    /// The bridge thread is gone.
    #[error("the D-Bus thread stopped")]
    Disconnected,
}

/// Result alias of the DBus layer.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for ResolveError {
    fn from(err: Error) -> Self {
        match err {
            Error::IncompatibleVersion(version) => ResolveError::IncompatibleVersion(version),
            Error::Disconnected => ResolveError::Cancelled,
            other => ResolveError::Transport(other.to_string()),
        }
    }
}
