//! [MenuResolver] backed by the [Bridge].

use std::rc::Rc;

use appmenu_core::error::{ProbeError, ResolveError};
use appmenu_core::registry::WindowId;
use appmenu_core::resolver::{MenuResolver, ResolveRequest, ResolverEvent, Ticket};
use appmenu_core::source::RemoteMenuSource;
use log::warn;

use crate::bridge::{Bridge, Reply};

/// Resolves menus over the session bus.
///
/// The bridge is shared with whoever drains registrar events, hence the [Rc].
#[derive(Debug)]
pub struct DbusResolver {
    bridge: Rc<Bridge>,
    failed: Vec<ResolverEvent>,
}

impl DbusResolver {
    /// Resolve through `bridge`.
    pub fn new(bridge: Rc<Bridge>) -> Self {
        Self {
            bridge,
            failed: Vec::new(),
        }
    }
}

impl MenuResolver for DbusResolver {
    fn resolve(&mut self, request: ResolveRequest) {
        let (window, ticket) = (request.window, request.ticket);
        if let Err(err) = self.bridge.resolve(request) {
            warn!("Cannot resolve menu of {window}: {err}");
            self.failed
                .push(ResolverEvent::Resolved(window, ticket, Err(ResolveError::from(err))));
        }
    }

    fn probe(&mut self, window: WindowId, ticket: Ticket) {
        if let Err(err) = self.bridge.probe(window, ticket) {
            warn!("Cannot probe {window}: {err}");
            self.failed
                .push(ResolverEvent::Probed(window, ticket, Err(ProbeError::Cancelled)));
        }
    }

    fn cancel(&mut self, window: WindowId) {
        let _ = self.bridge.cancel(window);
    }

    fn poll(&mut self) -> Vec<ResolverEvent> {
        let mut events = std::mem::take(&mut self.failed);
        events.extend(self.bridge.take_replies().into_iter().map(|reply| match reply {
            Reply::Resolved(window, ticket, result) => ResolverEvent::Resolved(
                window,
                ticket,
                result.map(|client| Box::new(client) as Box<dyn RemoteMenuSource>),
            ),
            Reply::Probed(window, ticket, result) => ResolverEvent::Probed(window, ticket, result),
        }));
        events
    }
}
