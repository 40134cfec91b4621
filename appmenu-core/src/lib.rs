#![warn(missing_docs)]

//! Core state machines for appmenu => See `appmenu` crate.
//!
//! Contains the menu model, the widget binder, the popup engine and its coordinator, and the
//! window registry. Everything here is single threaded and driven by its owner's event loop.

/// Contains the typed [Emitter](signal::Emitter) with scoped subscriptions.
pub mod signal;

/// Contains the error types.
pub mod error;

/// Contains the [Clock](time::Clock) abstraction and the leave debounce timer.
pub mod time;

/// Contains the [MenuTree](model::MenuTree) menu model.
pub mod model;

/// Contains the boundary to remote menu sources.
pub mod source;

/// Contains the asynchronous menu resolver boundary.
pub mod resolver;

/// Contains the [WindowRegistry](registry::WindowRegistry).
pub mod registry;

/// Contains rendered widgets and their capabilities.
pub mod widget;

/// Contains the [Binder](binder::Binder) between model nodes and widgets.
pub mod binder;

/// Contains keyboard focus targets.
pub mod focus;

/// Contains the shared input grab.
pub mod grab;

/// Contains the popup engine.
pub mod popup;

/// Contains the [MenuManager](manager::MenuManager) coordinating popups.
pub mod manager;

/// Contains the [MenuView](view::MenuView) tying binder, popups and coordinator together.
pub mod view;

/// Contains the [AppletConfig](config::AppletConfig) options.
pub mod config;

/// Contains in-memory collaborators for tests.
pub mod testing;

pub use config::AppletConfig;
pub use model::{MenuKind, MenuTree, NodeId};
pub use registry::{WindowId, WindowRegistry};
pub use view::{MenuView, ViewAction};
