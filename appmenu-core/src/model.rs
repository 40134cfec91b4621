//! Protocol-agnostic menu model.
//!
//! A [MenuTree] is an arena of [MenuNode]s keyed by the ids the remote source assigned. Parents
//! own their ordered child id lists; children only keep the id of their parent. Every mutation
//! queues a [ModelEvent]; [MenuTree::flush] hands the queue to subscribers in order.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;

use crate::error::StructureError;
use crate::signal::{Emitter, Inbox, Subscription};
use crate::source::SourceChange;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Stable id of a menu node, assigned by the remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub i32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MenuKind {
    /// The top of a window's menu.
    Root,
    /// An activatable entry.
    #[default]
    Item,
    /// An entry opening a nested popup.
    SubMenu,
    /// An inline group of entries.
    Section,
    /// A horizontal rule.
    Separator,
}

impl MenuKind {
    /// Whether nodes of this kind may have children.
    pub fn holds_children(self) -> bool {
        matches!(self, MenuKind::Root | MenuKind::SubMenu | MenuKind::Section)
    }
}

/// Reference to an item icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconRef {
    /// Themed icon name.
    Name(String),
    /// Encoded image bytes (usually PNG).
    Data(Vec<u8>),
}

/// Toggle decoration of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToggleKind {
    /// Plain item.
    #[default]
    None,
    /// Independent check box.
    Checkmark,
    /// One of a group of radio items.
    Radio,
}

/// Full property set of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemProperties {
    /// Node kind.
    pub kind: MenuKind,
    /// Label with mnemonics already resolved.
    pub label: String,
    /// Optional icon.
    pub icon: Option<IconRef>,
    /// Whether the item reacts to activation.
    pub enabled: bool,
    /// Whether the item is shown at all.
    pub visible: bool,
    /// Toggle decoration.
    pub toggle_kind: ToggleKind,
    /// Toggle state, meaningful when `toggle_kind` is not [ToggleKind::None].
    pub toggle_state: bool,
    /// Human readable accelerator such as `Ctrl+S`.
    pub accelerator: String,
    /// Remote action name, if the protocol names actions.
    pub action: String,
}

impl ItemProperties {
    /// Default properties for a node of the given kind.
    pub fn new(kind: MenuKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Default properties with a label.
    pub fn labeled(kind: MenuKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            ..Self::default()
        }
    }

    /// Properties of `other` that differ from `self`, kind first.
    pub fn changes_to(&self, other: &ItemProperties) -> Vec<Property> {
        let mut changes = Vec::new();
        if self.kind != other.kind {
            changes.push(Property::Kind(other.kind));
        }
        if self.label != other.label {
            changes.push(Property::Label(other.label.clone()));
        }
        if self.icon != other.icon {
            changes.push(Property::Icon(other.icon.clone()));
        }
        if self.enabled != other.enabled {
            changes.push(Property::Enabled(other.enabled));
        }
        if self.visible != other.visible {
            changes.push(Property::Visible(other.visible));
        }
        if self.toggle_kind != other.toggle_kind {
            changes.push(Property::ToggleKind(other.toggle_kind));
        }
        if self.toggle_state != other.toggle_state {
            changes.push(Property::ToggleState(other.toggle_state));
        }
        if self.accelerator != other.accelerator {
            changes.push(Property::Accelerator(other.accelerator.clone()));
        }
        if self.action != other.action {
            changes.push(Property::Action(other.action.clone()));
        }
        changes
    }
}

impl Default for ItemProperties {
    fn default() -> Self {
        Self {
            kind: MenuKind::Item,
            label: String::new(),
            icon: None,
            enabled: true,
            visible: true,
            toggle_kind: ToggleKind::None,
            toggle_state: false,
            accelerator: String::new(),
            action: String::new(),
        }
    }
}

/// A single property assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// See [ItemProperties::kind].
    Kind(MenuKind),
    /// See [ItemProperties::label].
    Label(String),
    /// See [ItemProperties::icon].
    Icon(Option<IconRef>),
    /// See [ItemProperties::enabled].
    Enabled(bool),
    /// See [ItemProperties::visible].
    Visible(bool),
    /// See [ItemProperties::toggle_kind].
    ToggleKind(ToggleKind),
    /// See [ItemProperties::toggle_state].
    ToggleState(bool),
    /// See [ItemProperties::accelerator].
    Accelerator(String),
    /// See [ItemProperties::action].
    Action(String),
}

/// Which rendered aspect of a node changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyName {
    /// Label text.
    Label,
    /// Icon.
    Icon,
    /// Sensitivity.
    Enabled,
    /// Visibility.
    Visible,
    /// Toggle kind or state.
    Toggle,
    /// Accelerator text.
    Accelerator,
    /// Action name.
    Action,
}

/// Change notifications produced by [MenuTree] mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// A property of the node changed.
    Changed(NodeId, PropertyName),
    /// The node kind changed; bound widgets must be rebuilt.
    KindChanged(NodeId),
    /// `(parent, child, position)`.
    ChildAdded(NodeId, NodeId, usize),
    /// `(parent, child)`.
    ChildRemoved(NodeId, NodeId),
    /// `(parent, child, old position, new position)`.
    ChildMoved(NodeId, NodeId, usize, usize),
    /// The parent lost its last child.
    ChildrenEmpty(NodeId),
    /// The node was destroyed. Emitted parent first.
    Destroyed(NodeId),
}

/// One node of the model.
#[derive(Debug, Clone)]
pub struct MenuNode {
    id: NodeId,
    properties: ItemProperties,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl MenuNode {
    /// The node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current properties.
    pub fn properties(&self) -> &ItemProperties {
        &self.properties
    }

    /// Node kind.
    pub fn kind(&self) -> MenuKind {
        self.properties.kind
    }

    /// Parent id, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered child ids.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena holding one remote menu.
pub struct MenuTree {
    instance: u64,
    root: NodeId,
    nodes: HashMap<NodeId, MenuNode>,
    pending: Vec<ModelEvent>,
    events: Emitter<ModelEvent>,
}

impl MenuTree {
    /// Creates a tree holding only its root node.
    pub fn new(root: NodeId) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            MenuNode {
                id: root,
                properties: ItemProperties::new(MenuKind::Root),
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            root,
            nodes,
            pending: Vec::new(),
            events: Emitter::new(),
        }
    }

    /// Process-unique number of this tree, used to tell rebuilt trees apart.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// The root id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Whether the root has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        !self.nodes.contains_key(&self.root)
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Option<&MenuNode> {
        self.nodes.get(&id)
    }

    /// Whether the node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Ordered children of a node. Unknown nodes have none.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    /// Number of live nodes, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes left.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach a listener for flushed events.
    #[must_use = "dropping the subscription detaches the listener immediately"]
    pub fn subscribe(&self, listener: impl Fn(&ModelEvent) + 'static) -> Subscription {
        self.events.subscribe(listener)
    }

    /// Attach an inbox for flushed events.
    #[must_use = "dropping the subscription detaches the inbox immediately"]
    pub fn queue(&self) -> (Subscription, Inbox<ModelEvent>) {
        self.events.queue()
    }

    /// Deliver queued events to subscribers. Returns how many were delivered.
    pub fn flush(&mut self) -> usize {
        let events = mem::take(&mut self.pending);
        for event in &events {
            self.events.emit(event);
        }
        events.len()
    }

    /// Events queued since the last flush.
    pub fn pending(&self) -> &[ModelEvent] {
        &self.pending
    }

    /// Create a detached node. Returns false when the id is taken.
    pub fn insert(&mut self, id: NodeId, properties: ItemProperties) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(
            id,
            MenuNode {
                id,
                properties,
                parent: None,
                children: Vec::new(),
            },
        );
        true
    }

    /// Assign a property. Equal values are ignored; returns whether anything changed.
    pub fn set(&mut self, id: NodeId, property: Property) -> bool {
        let root = self.root;
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        let props = &mut node.properties;

        let event = match property {
            Property::Kind(kind) => {
                if props.kind == kind {
                    return false;
                }
                if id == root || kind == MenuKind::Root {
                    warn!("Refusing to change kind of {id} to {kind:?}");
                    return false;
                }
                props.kind = kind;
                ModelEvent::KindChanged(id)
            },
            Property::Label(label) => {
                if props.label == label {
                    return false;
                }
                props.label = label;
                ModelEvent::Changed(id, PropertyName::Label)
            },
            Property::Icon(icon) => {
                if props.icon == icon {
                    return false;
                }
                props.icon = icon;
                ModelEvent::Changed(id, PropertyName::Icon)
            },
            Property::Enabled(enabled) => {
                if props.enabled == enabled {
                    return false;
                }
                props.enabled = enabled;
                ModelEvent::Changed(id, PropertyName::Enabled)
            },
            Property::Visible(visible) => {
                if props.visible == visible {
                    return false;
                }
                props.visible = visible;
                ModelEvent::Changed(id, PropertyName::Visible)
            },
            Property::ToggleKind(kind) => {
                if props.toggle_kind == kind {
                    return false;
                }
                props.toggle_kind = kind;
                ModelEvent::Changed(id, PropertyName::Toggle)
            },
            Property::ToggleState(state) => {
                if props.toggle_state == state {
                    return false;
                }
                props.toggle_state = state;
                ModelEvent::Changed(id, PropertyName::Toggle)
            },
            Property::Accelerator(accel) => {
                if props.accelerator == accel {
                    return false;
                }
                props.accelerator = accel;
                ModelEvent::Changed(id, PropertyName::Accelerator)
            },
            Property::Action(action) => {
                if props.action == action {
                    return false;
                }
                props.action = action;
                ModelEvent::Changed(id, PropertyName::Action)
            },
        };

        self.pending.push(event);
        true
    }

    /// Set the label.
    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> bool {
        self.set(id, Property::Label(label.into()))
    }

    /// Show or hide the node.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> bool {
        self.set(id, Property::Visible(visible))
    }

    /// Enable or disable the node.
    pub fn set_sensitive(&mut self, id: NodeId, sensitive: bool) -> bool {
        self.set(id, Property::Enabled(sensitive))
    }

    /// Set the toggle decoration.
    pub fn set_toggle_kind(&mut self, id: NodeId, kind: ToggleKind) -> bool {
        self.set(id, Property::ToggleKind(kind))
    }

    /// Set the toggle state.
    pub fn set_toggle_state(&mut self, id: NodeId, state: bool) -> bool {
        self.set(id, Property::ToggleState(state))
    }

    /// Set a themed icon, or clear the icon with `None`.
    pub fn set_icon_name(&mut self, id: NodeId, name: Option<&str>) -> bool {
        let icon = name
            .filter(|name| !name.is_empty())
            .map(|name| IconRef::Name(name.to_string()));
        self.set(id, Property::Icon(icon))
    }

    /// Set the accelerator text.
    pub fn set_accelerator(&mut self, id: NodeId, accel: impl Into<String>) -> bool {
        self.set(id, Property::Accelerator(accel.into()))
    }

    /// Set the remote action name.
    pub fn set_action(&mut self, id: NodeId, action: impl Into<String>) -> bool {
        self.set(id, Property::Action(action.into()))
    }

    /// Change the node kind. Bound widgets are rebuilt, the node itself persists.
    pub fn set_kind(&mut self, id: NodeId, kind: MenuKind) -> bool {
        self.set(id, Property::Kind(kind))
    }

    /// Insert `child` under `parent` at `position`, clamped to the child count.
    ///
    /// A child listed under another parent is detached from it first. Listing a child twice
    /// under the same parent is rejected.
    pub fn add_child(&mut self, parent: NodeId, position: usize, child: NodeId) -> Result<(), StructureError> {
        let result = self.try_add_child(parent, position, child);
        if let Err(err) = &result {
            warn!("Ignoring child insertion: {err}");
        }
        result
    }

    fn try_add_child(&mut self, parent: NodeId, position: usize, child: NodeId) -> Result<(), StructureError> {
        let parent_kind = self
            .nodes
            .get(&parent)
            .map(|node| node.kind())
            .ok_or(StructureError::UnknownNode(parent))?;
        let previous = self
            .nodes
            .get(&child)
            .map(|node| node.parent)
            .ok_or(StructureError::UnknownNode(child))?;

        if parent == child || self.is_ancestor(child, parent) {
            return Err(StructureError::Cycle(parent, child));
        }
        if !parent_kind.holds_children() {
            return Err(StructureError::NotAContainer(parent));
        }
        if previous == Some(parent) {
            return Err(StructureError::DuplicateChild(parent, child));
        }
        if let Some(old_parent) = previous {
            self.detach(old_parent, child);
        }

        let Some(node) = self.nodes.get_mut(&parent) else {
            return Err(StructureError::UnknownNode(parent));
        };
        let position = position.min(node.children.len());
        node.children.insert(position, child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        self.pending.push(ModelEvent::ChildAdded(parent, child, position));
        Ok(())
    }

    /// Detach `child` from `parent`. The child node stays alive.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), StructureError> {
        let listed = self
            .nodes
            .get(&parent)
            .map(|node| node.children.contains(&child))
            .unwrap_or(false);
        if !listed {
            let err = StructureError::NotAChild(parent, child);
            warn!("Ignoring child removal: {err}");
            return Err(err);
        }
        self.detach(parent, child);
        Ok(())
    }

    /// Move `child` to `position` (clamped) among its siblings. Returns whether it moved.
    pub fn move_child(&mut self, parent: NodeId, child: NodeId, position: usize) -> Result<bool, StructureError> {
        let Some(node) = self.nodes.get_mut(&parent) else {
            let err = StructureError::UnknownNode(parent);
            warn!("Ignoring child move: {err}");
            return Err(err);
        };
        let Some(old) = node.children.iter().position(|id| *id == child) else {
            let err = StructureError::NotAChild(parent, child);
            warn!("Ignoring child move: {err}");
            return Err(err);
        };

        let new = position.min(node.children.len() - 1);
        if old == new {
            return Ok(false);
        }
        node.children.remove(old);
        node.children.insert(new, child);
        self.pending.push(ModelEvent::ChildMoved(parent, child, old, new));
        Ok(true)
    }

    /// Destroy a node and all of its descendants. Returns false for unknown ids.
    pub fn destroy(&mut self, id: NodeId) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        if let Some(parent) = self.parent(id) {
            self.detach(parent, id);
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                self.pending.push(ModelEvent::Destroyed(current));
                stack.extend(node.children.iter().rev().copied());
            }
        }
        true
    }

    /// Apply one change reported by a remote source.
    pub fn apply(&mut self, change: SourceChange) -> Result<(), StructureError> {
        match change {
            SourceChange::ChildAdded { parent, position, node } => {
                let id = node.id;
                let changes = match self.nodes.get(&id) {
                    Some(existing) => existing.properties.changes_to(&node.properties),
                    None => {
                        self.insert(id, node.properties);
                        Vec::new()
                    },
                };
                for property in changes {
                    self.set(id, property);
                }
                self.add_child(parent, position, id)
            },
            SourceChange::ChildRemoved { parent, child } => self.remove_child(parent, child),
            SourceChange::ChildMoved { parent, child, new_position, .. } => {
                self.move_child(parent, child, new_position).map(|_| ())
            },
            SourceChange::PropertyChanged { id, property } => {
                if !self.contains(id) {
                    let err = StructureError::UnknownNode(id);
                    warn!("Ignoring property change: {err}");
                    return Err(err);
                }
                self.set(id, property);
                Ok(())
            },
            SourceChange::Destroyed { id } => {
                if self.destroy(id) {
                    Ok(())
                } else {
                    Err(StructureError::UnknownNode(id))
                }
            },
        }
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) {
        let Some(node) = self.nodes.get_mut(&parent) else {
            return;
        };
        node.children.retain(|id| *id != child);
        let emptied = node.children.is_empty();
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
        self.pending.push(ModelEvent::ChildRemoved(parent, child));
        if emptied {
            self.pending.push(ModelEvent::ChildrenEmpty(parent));
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        while let Some(parent) = self.parent(node) {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }
}

impl fmt::Debug for MenuTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuTree")
            .field("instance", &self.instance)
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RemoteNode;

    const ROOT: NodeId = NodeId(0);
    const A: NodeId = NodeId(1);
    const B: NodeId = NodeId(2);
    const C: NodeId = NodeId(3);

    fn item(id: NodeId, label: &str) -> RemoteNode {
        RemoteNode::new(id, ItemProperties::labeled(MenuKind::Item, label))
    }

    fn added(parent: NodeId, position: usize, node: RemoteNode) -> SourceChange {
        SourceChange::ChildAdded { parent, position, node }
    }

    #[test]
    fn test_add_then_move_reorders() {
        let mut tree = MenuTree::new(ROOT);
        tree.apply(added(ROOT, 0, item(A, "a"))).unwrap();
        tree.apply(added(ROOT, 1, item(B, "b"))).unwrap();
        tree.apply(SourceChange::ChildMoved {
            parent: ROOT,
            child: A,
            old_position: 0,
            new_position: 1,
        })
        .unwrap();

        assert_eq!(tree.children(ROOT), &[B, A]);
        assert_eq!(tree.pending().last(), Some(&ModelEvent::ChildMoved(ROOT, A, 0, 1)));
    }

    #[test]
    fn test_setters_are_idempotent() {
        let mut tree = MenuTree::new(ROOT);
        tree.insert(A, ItemProperties::default());
        tree.set_visible(A, false);
        tree.flush();

        assert!(tree.set_visible(A, true));
        assert!(!tree.set_visible(A, true));
        assert_eq!(tree.pending(), &[ModelEvent::Changed(A, PropertyName::Visible)]);
    }

    #[test]
    fn test_duplicate_child_rejected() {
        let mut tree = MenuTree::new(ROOT);
        tree.insert(A, ItemProperties::default());
        tree.add_child(ROOT, 0, A).unwrap();

        assert_eq!(tree.add_child(ROOT, 0, A), Err(StructureError::DuplicateChild(ROOT, A)));
        assert_eq!(tree.children(ROOT), &[A]);
    }

    #[test]
    fn test_reparent_detaches_from_previous_parent() {
        let mut tree = MenuTree::new(ROOT);
        tree.insert(A, ItemProperties::new(MenuKind::SubMenu));
        tree.insert(B, ItemProperties::new(MenuKind::SubMenu));
        tree.insert(C, ItemProperties::default());
        tree.add_child(ROOT, 0, A).unwrap();
        tree.add_child(ROOT, 1, B).unwrap();
        tree.add_child(A, 0, C).unwrap();
        tree.flush();

        tree.add_child(B, 0, C).unwrap();
        assert!(tree.children(A).is_empty());
        assert_eq!(tree.children(B), &[C]);
        assert_eq!(tree.parent(C), Some(B));
        assert_eq!(
            tree.pending(),
            &[
                ModelEvent::ChildRemoved(A, C),
                ModelEvent::ChildrenEmpty(A),
                ModelEvent::ChildAdded(B, C, 0),
            ]
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let mut tree = MenuTree::new(ROOT);
        tree.insert(A, ItemProperties::new(MenuKind::SubMenu));
        tree.add_child(ROOT, 0, A).unwrap();
        assert_eq!(tree.add_child(A, 0, ROOT), Err(StructureError::Cycle(A, ROOT)));
    }

    #[test]
    fn test_remove_unknown_child_is_noop() {
        let mut tree = MenuTree::new(ROOT);
        tree.insert(A, ItemProperties::default());
        assert_eq!(tree.remove_child(ROOT, A), Err(StructureError::NotAChild(ROOT, A)));
        assert!(tree.pending().is_empty());
    }

    #[test]
    fn test_remove_last_child_reports_empty() {
        let mut tree = MenuTree::new(ROOT);
        tree.insert(A, ItemProperties::default());
        tree.add_child(ROOT, 0, A).unwrap();
        tree.flush();

        tree.remove_child(ROOT, A).unwrap();
        assert_eq!(
            tree.pending(),
            &[ModelEvent::ChildRemoved(ROOT, A), ModelEvent::ChildrenEmpty(ROOT)]
        );
        assert!(tree.contains(A));
        assert_eq!(tree.parent(A), None);
    }

    #[test]
    fn test_move_clamps_and_keeps_relative_order() {
        let mut tree = MenuTree::new(ROOT);
        for (index, id) in [A, B, C].into_iter().enumerate() {
            tree.insert(id, ItemProperties::default());
            tree.add_child(ROOT, index, id).unwrap();
        }

        assert_eq!(tree.move_child(ROOT, A, 99), Ok(true));
        assert_eq!(tree.children(ROOT), &[B, C, A]);
        assert_eq!(tree.move_child(ROOT, A, 2), Ok(false));
    }

    #[test]
    fn test_destroy_is_recursive_parent_first() {
        let mut tree = MenuTree::new(ROOT);
        tree.insert(A, ItemProperties::new(MenuKind::SubMenu));
        tree.insert(B, ItemProperties::default());
        tree.insert(C, ItemProperties::default());
        tree.add_child(ROOT, 0, A).unwrap();
        tree.add_child(A, 0, B).unwrap();
        tree.add_child(A, 1, C).unwrap();
        tree.flush();

        assert!(tree.destroy(A));
        assert_eq!(
            tree.pending(),
            &[
                ModelEvent::ChildRemoved(ROOT, A),
                ModelEvent::ChildrenEmpty(ROOT),
                ModelEvent::Destroyed(A),
                ModelEvent::Destroyed(B),
                ModelEvent::Destroyed(C),
            ]
        );
        assert!(!tree.contains(B));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_root_kind_is_fixed() {
        let mut tree = MenuTree::new(ROOT);
        assert!(!tree.set_kind(ROOT, MenuKind::SubMenu));
        assert!(tree.pending().is_empty());
    }

    #[test]
    fn test_flush_delivers_in_order() {
        let mut tree = MenuTree::new(ROOT);
        let (_subscription, inbox) = tree.queue();
        tree.apply(added(ROOT, 0, item(A, "a"))).unwrap();
        tree.set_label(A, "renamed");
        assert_eq!(tree.flush(), 2);
        assert_eq!(
            inbox.drain(),
            vec![
                ModelEvent::ChildAdded(ROOT, A, 0),
                ModelEvent::Changed(A, PropertyName::Label),
            ]
        );
    }
}
