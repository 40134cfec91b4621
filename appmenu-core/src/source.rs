//! Boundary to the application that exports a menu.

use std::fmt;

use log::debug;

use crate::model::{ItemProperties, MenuTree, ModelEvent, NodeId, Property};

/// Item events reported back to the exporting application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemEvent {
    /// The item was activated.
    Clicked,
    /// The item's submenu was shown.
    Opened,
    /// The item's submenu was hidden.
    Closed,
}

impl ItemEvent {
    /// Event id as used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ItemEvent::Clicked => "clicked",
            ItemEvent::Opened => "opened",
            ItemEvent::Closed => "closed",
        }
    }
}

impl fmt::Display for ItemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node as reported by a remote source.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteNode {
    /// Id assigned by the source.
    pub id: NodeId,
    /// Initial properties.
    pub properties: ItemProperties,
}

impl RemoteNode {
    /// Creates a node description.
    pub fn new(id: NodeId, properties: ItemProperties) -> Self {
        Self { id, properties }
    }
}

/// A change reported by a remote source. Changes are applied in the order they were issued.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceChange {
    /// A node was inserted under `parent`. Unknown nodes are created on the fly.
    ChildAdded {
        /// Parent id.
        parent: NodeId,
        /// Position among the parent's children.
        position: usize,
        /// The inserted node.
        node: RemoteNode,
    },
    /// A node was detached from `parent`.
    ChildRemoved {
        /// Parent id.
        parent: NodeId,
        /// Removed child id.
        child: NodeId,
    },
    /// A node moved among its siblings.
    ChildMoved {
        /// Parent id.
        parent: NodeId,
        /// Moved child id.
        child: NodeId,
        /// Position before the move, informational only.
        old_position: usize,
        /// Position after the move.
        new_position: usize,
    },
    /// One property of a node changed.
    PropertyChanged {
        /// Node id.
        id: NodeId,
        /// New value.
        property: Property,
    },
    /// The node and its subtree are gone. Destroying the root ends the menu.
    Destroyed {
        /// Node id.
        id: NodeId,
    },
}

/// A live remote menu.
///
/// Implementations buffer incoming notifications and hand them out on [RemoteMenuSource::poll_changes]
/// so that the model is only ever mutated from the event loop.
pub trait RemoteMenuSource {
    /// Id of the remote root node.
    fn root_id(&self) -> NodeId;

    /// Take every change received since the last call, in issuance order.
    fn poll_changes(&mut self) -> Vec<SourceChange>;

    /// Hint that the node's submenu is about to be displayed. Fire and forget.
    fn send_about_to_show(&self, id: NodeId);

    /// Report an item event to the application. Fire and forget.
    fn send_event(&self, id: NodeId, event: ItemEvent);

    /// Short description used in log messages, e.g. the bus name and path.
    fn describe(&self) -> String;
}

/// Result of one [AppMenu::pump].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpOutcome {
    /// Number of changes taken from the source.
    pub applied: usize,
    /// The root was destroyed or lost its last child.
    pub collapsed: bool,
}

/// A remote source together with the model it feeds.
pub struct AppMenu {
    tree: MenuTree,
    source: Box<dyn RemoteMenuSource>,
}

impl AppMenu {
    /// Wraps a freshly constructed source and applies whatever it already delivered.
    pub fn new(source: Box<dyn RemoteMenuSource>) -> Self {
        let tree = MenuTree::new(source.root_id());
        let mut menu = Self { tree, source };
        menu.pump();
        menu
    }

    /// The model.
    pub fn tree(&self) -> &MenuTree {
        &self.tree
    }

    /// Mutable access to the model.
    pub fn tree_mut(&mut self) -> &mut MenuTree {
        &mut self.tree
    }

    /// Root id of the model.
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Apply pending source changes and flush the resulting model events.
    pub fn pump(&mut self) -> PumpOutcome {
        let changes = self.source.poll_changes();
        let applied = changes.len();
        let mut skipped = 0;
        for change in changes {
            if self.tree.apply(change).is_err() {
                skipped += 1;
            }
        }
        if skipped > 0 {
            debug!("Skipped {skipped} malformed changes from {}", self.source.describe());
        }

        let root = self.tree.root();
        let collapsed = self.tree.pending().iter().any(|event| match event {
            ModelEvent::ChildrenEmpty(id) | ModelEvent::Destroyed(id) => *id == root,
            _ => false,
        });
        self.tree.flush();

        PumpOutcome { applied, collapsed }
    }

    /// Ask the application to refresh a submenu.
    pub fn about_to_show(&self, id: NodeId) {
        self.source.send_about_to_show(id);
    }

    /// Report an item event.
    pub fn send_event(&self, id: NodeId, event: ItemEvent) {
        self.source.send_event(id, event);
    }

    /// Source description for logs.
    pub fn describe(&self) -> String {
        self.source.describe()
    }
}

impl fmt::Debug for AppMenu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppMenu")
            .field("source", &self.source.describe())
            .field("tree", &self.tree)
            .finish()
    }
}
