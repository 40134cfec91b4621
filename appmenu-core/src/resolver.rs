//! Turning window announcements into live menu sources.
//!
//! Resolution involves round-trips (version validation, property probing), so a [MenuResolver]
//! only accepts requests and reports results later through [MenuResolver::poll].

use crate::error::{ProbeError, ResolveError};
use crate::registry::WindowId;
use crate::source::RemoteMenuSource;

/// Everything known about where a window's menu lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuLocator {
    /// Unique bus name of the exporting application.
    pub sender: Option<String>,
    /// Object path of the menu bar.
    pub menubar_path: Option<String>,
    /// Object path of the application menu, GTK only.
    pub appmenu_path: Option<String>,
    /// Object path of the window action group, GTK only.
    pub window_path: Option<String>,
    /// Object path of the application action group, GTK only.
    pub application_path: Option<String>,
    /// Whether the menu is exported with the GTK menu model instead of dbusmenu.
    pub is_gtk: bool,
}

impl MenuLocator {
    /// Locator for a dbusmenu announced through the registrar.
    pub fn dbusmenu(sender: impl Into<String>, menubar_path: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
            menubar_path: Some(menubar_path.into()),
            ..Self::default()
        }
    }

    /// Locator for a GTK menu model. Action group paths are filled in separately.
    pub fn gtk(sender: impl Into<String>, menubar_path: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
            menubar_path: Some(menubar_path.into()),
            is_gtk: true,
            ..Self::default()
        }
    }

    /// Fill every field that is still unset from `other`. Returns whether anything changed.
    ///
    /// The protocol flavour follows whichever announcement supplied the sender.
    pub fn merge_from(&mut self, other: &MenuLocator) -> bool {
        let mut changed = false;
        if self.sender.is_none() && other.sender.is_some() {
            self.is_gtk = other.is_gtk;
        }
        for (mine, theirs) in [
            (&mut self.sender, &other.sender),
            (&mut self.menubar_path, &other.menubar_path),
            (&mut self.appmenu_path, &other.appmenu_path),
            (&mut self.window_path, &other.window_path),
            (&mut self.application_path, &other.application_path),
        ] {
            if mine.is_none() {
                if let Some(value) = theirs.as_ref().filter(|value| !value.is_empty()) {
                    *mine = Some(value.clone());
                    changed = true;
                }
            }
        }
        changed
    }

    /// Whether there is enough information to build a client.
    pub fn is_resolvable(&self) -> bool {
        self.sender.is_some() && self.menubar_path.is_some()
    }
}

/// Identifies one resolve or probe request. Completions carry it back so that answers to
/// withdrawn requests can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

/// Request to build a client for one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Window the menu belongs to.
    pub window: WindowId,
    /// Issued by the registry for this request.
    pub ticket: Ticket,
    /// Where the menu lives. Always resolvable.
    pub locator: MenuLocator,
}

/// Completion reported by a [MenuResolver].
pub enum ResolverEvent {
    /// A client was built, or construction failed.
    Resolved(WindowId, Ticket, Result<Box<dyn RemoteMenuSource>, ResolveError>),
    /// A window property probe finished.
    Probed(WindowId, Ticket, Result<MenuLocator, ProbeError>),
}

impl std::fmt::Debug for ResolverEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolverEvent::Resolved(window, ticket, Ok(source)) => {
                write!(f, "Resolved({window:?}, {ticket:?}, Ok({}))", source.describe())
            },
            ResolverEvent::Resolved(window, ticket, Err(err)) => {
                write!(f, "Resolved({window:?}, {ticket:?}, Err({err:?}))")
            },
            ResolverEvent::Probed(window, ticket, result) => write!(f, "Probed({window:?}, {ticket:?}, {result:?})"),
        }
    }
}

/// Asynchronous factory of [RemoteMenuSource] clients.
pub trait MenuResolver {
    /// Start building a client. The result arrives through [MenuResolver::poll].
    fn resolve(&mut self, request: ResolveRequest);

    /// Start probing window properties for a window that announced nothing. The completion
    /// carries `ticket`.
    fn probe(&mut self, window: WindowId, ticket: Ticket);

    /// Abandon outstanding work for a window. Late results may still be reported. The registry
    /// ignores them by [Ticket].
    fn cancel(&mut self, window: WindowId);

    /// Take every completion since the last call.
    fn poll(&mut self) -> Vec<ResolverEvent>;
}
