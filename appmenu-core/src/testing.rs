//! In-memory collaborators for tests and demos.
//!
//! Every double hands out a second handle sharing its state, so a test can keep driving or
//! inspecting it after the original was boxed and moved into a registry.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{ProbeError, ResolveError};
use crate::model::{ItemProperties, NodeId, Property};
use crate::registry::{AppIcon, AppInfo, WindowId, WindowInfo, WindowTracker};
use crate::resolver::{MenuLocator, MenuResolver, ResolveRequest, ResolverEvent, Ticket};
use crate::source::{ItemEvent, RemoteMenuSource, RemoteNode, SourceChange};

#[derive(Debug, Default)]
struct ScriptState {
    changes: VecDeque<SourceChange>,
    about_to_show: Vec<NodeId>,
    events: Vec<(NodeId, ItemEvent)>,
    dropped: bool,
}

/// A [RemoteMenuSource] fed by a [SourceScript].
#[derive(Debug)]
pub struct ScriptedSource {
    root: NodeId,
    name: String,
    state: Rc<RefCell<ScriptState>>,
}

impl ScriptedSource {
    /// Creates a source and the script that drives it.
    pub fn new(root: NodeId, name: impl Into<String>) -> (Self, SourceScript) {
        let state = Rc::new(RefCell::new(ScriptState::default()));
        let source = Self {
            root,
            name: name.into(),
            state: state.clone(),
        };
        (source, SourceScript { root, state })
    }
}

impl RemoteMenuSource for ScriptedSource {
    fn root_id(&self) -> NodeId {
        self.root
    }

    fn poll_changes(&mut self) -> Vec<SourceChange> {
        self.state.borrow_mut().changes.drain(..).collect()
    }

    fn send_about_to_show(&self, id: NodeId) {
        self.state.borrow_mut().about_to_show.push(id);
    }

    fn send_event(&self, id: NodeId, event: ItemEvent) {
        self.state.borrow_mut().events.push((id, event));
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.state.borrow_mut().dropped = true;
    }
}

/// Handle queueing changes for a [ScriptedSource] and recording what it was sent.
#[derive(Debug, Clone)]
pub struct SourceScript {
    root: NodeId,
    state: Rc<RefCell<ScriptState>>,
}

impl SourceScript {
    /// Root id of the source.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Queue a raw change.
    pub fn push(&self, change: SourceChange) -> &Self {
        self.state.borrow_mut().changes.push_back(change);
        self
    }

    /// Queue a child insertion.
    pub fn add_child(&self, parent: NodeId, position: usize, id: NodeId, properties: ItemProperties) -> &Self {
        self.push(SourceChange::ChildAdded {
            parent,
            position,
            node: RemoteNode::new(id, properties),
        })
    }

    /// Queue a child removal.
    pub fn remove(&self, parent: NodeId, child: NodeId) -> &Self {
        self.push(SourceChange::ChildRemoved { parent, child })
    }

    /// Queue a move.
    pub fn move_child(&self, parent: NodeId, child: NodeId, old_position: usize, new_position: usize) -> &Self {
        self.push(SourceChange::ChildMoved {
            parent,
            child,
            old_position,
            new_position,
        })
    }

    /// Queue a property change.
    pub fn set(&self, id: NodeId, property: Property) -> &Self {
        self.push(SourceChange::PropertyChanged { id, property })
    }

    /// Queue a destruction.
    pub fn destroy(&self, id: NodeId) -> &Self {
        self.push(SourceChange::Destroyed { id })
    }

    /// Changes not yet taken by the source.
    pub fn pending(&self) -> usize {
        self.state.borrow().changes.len()
    }

    /// Nodes the source was asked to refresh.
    pub fn about_to_show(&self) -> Vec<NodeId> {
        self.state.borrow().about_to_show.clone()
    }

    /// Item events the source received.
    pub fn events(&self) -> Vec<(NodeId, ItemEvent)> {
        self.state.borrow().events.clone()
    }

    /// Whether the source was dropped.
    pub fn is_dropped(&self) -> bool {
        self.state.borrow().dropped
    }
}

#[derive(Debug, Default)]
struct ResolverState {
    requests: Vec<ResolveRequest>,
    probes: Vec<(WindowId, Ticket)>,
    cancelled: Vec<WindowId>,
    completed: Vec<ResolverEvent>,
}

impl ResolverState {
    fn resolve_ticket(&self, window: WindowId) -> Ticket {
        self.requests
            .iter()
            .rev()
            .find(|request| request.window == window)
            .map_or(Ticket(0), |request| request.ticket)
    }

    fn probe_ticket(&self, window: WindowId) -> Ticket {
        self.probes
            .iter()
            .rev()
            .find(|(probed, _)| *probed == window)
            .map_or(Ticket(0), |(_, ticket)| *ticket)
    }
}

/// A [MenuResolver] completed by hand.
///
/// Completions answer the most recent request for the window at the time they are reported.
#[derive(Debug, Clone, Default)]
pub struct ManualResolver {
    state: Rc<RefCell<ResolverState>>,
}

impl ManualResolver {
    /// Creates a resolver without requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every resolve request received.
    pub fn requests(&self) -> Vec<ResolveRequest> {
        self.state.borrow().requests.clone()
    }

    /// Every probe request received.
    pub fn probes(&self) -> Vec<WindowId> {
        self.state.borrow().probes.iter().map(|(window, _)| *window).collect()
    }

    /// Every cancellation received.
    pub fn cancelled(&self) -> Vec<WindowId> {
        self.state.borrow().cancelled.clone()
    }

    /// Report a built client.
    pub fn complete(&self, window: WindowId, source: ScriptedSource) {
        let mut state = self.state.borrow_mut();
        let ticket = state.resolve_ticket(window);
        state
            .completed
            .push(ResolverEvent::Resolved(window, ticket, Ok(Box::new(source))));
    }

    /// Report a failed resolution.
    pub fn fail(&self, window: WindowId, err: ResolveError) {
        let mut state = self.state.borrow_mut();
        let ticket = state.resolve_ticket(window);
        state.completed.push(ResolverEvent::Resolved(window, ticket, Err(err)));
    }

    /// Report a finished probe.
    pub fn finish_probe(&self, window: WindowId, result: Result<MenuLocator, ProbeError>) {
        let mut state = self.state.borrow_mut();
        let ticket = state.probe_ticket(window);
        state.completed.push(ResolverEvent::Probed(window, ticket, result));
    }
}

impl MenuResolver for ManualResolver {
    fn resolve(&mut self, request: ResolveRequest) {
        self.state.borrow_mut().requests.push(request);
    }

    fn probe(&mut self, window: WindowId, ticket: Ticket) {
        self.state.borrow_mut().probes.push((window, ticket));
    }

    fn cancel(&mut self, window: WindowId) {
        self.state.borrow_mut().cancelled.push(window);
    }

    fn poll(&mut self) -> Vec<ResolverEvent> {
        self.state.borrow_mut().completed.drain(..).collect()
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    windows: Vec<WindowInfo>,
    focused: Option<WindowId>,
}

/// A [WindowTracker] over a fixed window list.
#[derive(Debug, Clone, Default)]
pub struct StaticTracker {
    state: Rc<RefCell<TrackerState>>,
}

impl StaticTracker {
    /// Creates a tracker without windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a window.
    pub fn add_window(&self, info: WindowInfo) {
        let mut state = self.state.borrow_mut();
        state.windows.retain(|window| window.id != info.id);
        state.windows.push(info);
    }

    /// Add a window owned by an application.
    pub fn add_app_window(&self, id: WindowId, app: &str, icon_name: Option<&str>) {
        self.add_window(WindowInfo {
            id,
            app: Some(AppInfo {
                id: format!("{app}.desktop"),
                name: app.to_string(),
                icon_name: icon_name.map(str::to_string),
            }),
            gtk: None,
        });
    }

    /// Remove a window.
    pub fn remove_window(&self, id: WindowId) {
        let mut state = self.state.borrow_mut();
        state.windows.retain(|window| window.id != id);
        if state.focused == Some(id) {
            state.focused = None;
        }
    }

    /// Change the focused window.
    pub fn set_focused(&self, window: Option<WindowId>) {
        self.state.borrow_mut().focused = window;
    }
}

impl WindowTracker for StaticTracker {
    fn windows(&self) -> Vec<WindowInfo> {
        self.state.borrow().windows.clone()
    }

    fn focused(&self) -> Option<WindowId> {
        self.state.borrow().focused
    }

    fn icon_for(&self, app: &AppInfo, size: u32) -> Option<AppIcon> {
        app.icon_name.as_ref().map(|name| AppIcon {
            name: name.clone(),
            size,
        })
    }
}
