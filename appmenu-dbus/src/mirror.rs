//! Mirror of a remote layout, diffed into [SourceChange]s.
//!
//! dbusmenu hands out whole subtrees on every `GetLayout`. The mirror remembers the last known
//! shape and emits the smallest ordered list of changes that turns the model into the new
//! layout, so that unchanged nodes keep their widgets.

use std::collections::{HashMap, HashSet};
use std::mem;

use appmenu_core::model::{ItemProperties, MenuKind, NodeId};
use appmenu_core::source::{RemoteNode, SourceChange};
use log::debug;
use serde::Deserialize;
use zbus::zvariant::{OwnedValue, Type, Value};

use crate::properties::{peel, DecodedItem};
use crate::{Error, Result};

/// A layout as returned by `GetLayout`, signature `(ia{sv}av)`.
#[derive(Debug, Deserialize, Type)]
pub struct RawLayout {
    pub id: i32,
    pub properties: HashMap<String, OwnedValue>,
    pub children: Vec<OwnedValue>,
}

/// A decoded layout subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: NodeId,
    pub item: DecodedItem,
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    /// A node without children.
    pub fn new(id: i32, item: DecodedItem) -> Self {
        Self {
            id: NodeId(id),
            item,
            children: Vec::new(),
        }
    }

    /// Replace the children.
    pub fn with_children(mut self, children: Vec<LayoutNode>) -> Self {
        self.children = children;
        self
    }

    /// Decode a `GetLayout` reply.
    pub fn from_raw(raw: RawLayout) -> Result<Self> {
        let children = raw
            .children
            .iter()
            .map(|child| Self::from_value(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: NodeId(raw.id),
            item: DecodedItem::decode(&raw.properties),
            children,
        })
    }

    fn from_value(value: &Value<'_>) -> Result<Self> {
        let Value::Structure(structure) = peel(value) else {
            return Err(Error::Layout("child is not a structure"));
        };
        let [id, properties, children] = structure.fields() else {
            return Err(Error::Layout("child does not have three fields"));
        };
        let Value::I32(id) = peel(id) else {
            return Err(Error::Layout("child id is not an int32"));
        };
        let properties = HashMap::<String, OwnedValue>::try_from(peel(properties).try_clone()?)?;
        let Value::Array(children) = peel(children) else {
            return Err(Error::Layout("children are not an array"));
        };
        let children = children
            .iter()
            .map(|child| Self::from_value(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: NodeId(*id),
            item: DecodedItem::decode(&properties),
            children,
        })
    }

    fn collect_ids(&self, into: &mut HashSet<NodeId>) {
        into.insert(self.id);
        for child in &self.children {
            child.collect_ids(into);
        }
    }
}

#[derive(Debug)]
struct Entry {
    item: DecodedItem,
    properties: ItemProperties,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Last known shape of a remote menu.
#[derive(Debug)]
pub struct LayoutMirror {
    root: NodeId,
    entries: HashMap<NodeId, Entry>,
}

impl LayoutMirror {
    /// Creates a mirror holding only the root.
    pub fn new(root: NodeId) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            root,
            Entry {
                item: DecodedItem::default(),
                properties: ItemProperties::new(MenuKind::Root),
                parent: None,
                children: Vec::new(),
            },
        );
        Self { root, entries }
    }

    /// Root id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Whether the node is known.
    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of known nodes, root included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether only the root is known.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Known children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.entries.get(&id).map(|entry| entry.children.as_slice()).unwrap_or(&[])
    }

    /// Replace the subtree rooted at `layout.id` and return the changes doing the same to the
    /// model. Layouts of unknown nodes are dropped.
    pub fn apply_layout(&mut self, layout: LayoutNode) -> Vec<SourceChange> {
        if !self.entries.contains_key(&layout.id) {
            debug!("Dropping layout of unknown node {}", layout.id);
            return Vec::new();
        }
        let mut incoming = HashSet::new();
        layout.collect_ids(&mut incoming);

        let mut changes = Vec::new();
        self.sync(layout, &incoming, &mut changes);
        changes
    }

    /// Apply an `ItemsPropertiesUpdated` signal.
    pub fn apply_properties(
        &mut self,
        updated: &[(i32, HashMap<String, OwnedValue>)],
        removed: &[(i32, Vec<String>)],
    ) -> Vec<SourceChange> {
        let mut touched = Vec::new();
        for (id, properties) in updated {
            let id = NodeId(*id);
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            for (key, value) in properties {
                entry.item.apply(key, Some(&**value));
            }
            if !touched.contains(&id) {
                touched.push(id);
            }
        }
        for (id, names) in removed {
            let id = NodeId(*id);
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            for name in names {
                entry.item.apply(name, None);
            }
            if !touched.contains(&id) {
                touched.push(id);
            }
        }

        let mut changes = Vec::new();
        for id in touched {
            let is_root = id == self.root;
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            let properties = entry.item.to_properties(is_root, !entry.children.is_empty());
            for property in entry.properties.changes_to(&properties) {
                changes.push(SourceChange::PropertyChanged { id, property });
            }
            entry.properties = properties;
        }
        changes
    }

    fn sync(&mut self, node: LayoutNode, incoming: &HashSet<NodeId>, changes: &mut Vec<SourceChange>) {
        let LayoutNode { id, item, children } = node;
        let properties = item.to_properties(id == self.root, !children.is_empty());
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        for property in entry.properties.changes_to(&properties) {
            changes.push(SourceChange::PropertyChanged { id, property });
        }
        entry.item = item;
        entry.properties = properties;
        let previous = mem::take(&mut entry.children);

        let wanted: HashSet<NodeId> = children.iter().map(|child| child.id).collect();
        let mut current = Vec::with_capacity(previous.len());
        for child in previous {
            if wanted.contains(&child) {
                current.push(child);
            } else if incoming.contains(&child) {
                // Reappears somewhere else in this layout.
                changes.push(SourceChange::ChildRemoved { parent: id, child });
                if let Some(entry) = self.entries.get_mut(&child) {
                    entry.parent = None;
                }
            } else {
                changes.push(SourceChange::Destroyed { id: child });
                self.forget(child);
            }
        }

        for (position, child) in children.into_iter().enumerate() {
            let child_id = child.id;
            match current.iter().position(|known| *known == child_id) {
                Some(old_position) if old_position == position => {},
                Some(old_position) => {
                    current.remove(old_position);
                    current.insert(position, child_id);
                    changes.push(SourceChange::ChildMoved {
                        parent: id,
                        child: child_id,
                        old_position,
                        new_position: position,
                    });
                },
                None => {
                    let child_properties = child.item.to_properties(false, !child.children.is_empty());
                    let old_parent = self.entries.get(&child_id).and_then(|entry| entry.parent);
                    if let Some(old_parent) = old_parent {
                        changes.push(SourceChange::ChildRemoved {
                            parent: old_parent,
                            child: child_id,
                        });
                        if let Some(entry) = self.entries.get_mut(&old_parent) {
                            entry.children.retain(|known| *known != child_id);
                        }
                    }
                    let entry = self.entries.entry(child_id).or_insert_with(|| Entry {
                        item: child.item.clone(),
                        properties: child_properties.clone(),
                        parent: None,
                        children: Vec::new(),
                    });
                    entry.item = child.item.clone();
                    entry.properties = child_properties.clone();
                    entry.parent = Some(id);

                    current.insert(position.min(current.len()), child_id);
                    changes.push(SourceChange::ChildAdded {
                        parent: id,
                        position,
                        node: RemoteNode::new(child_id, child_properties),
                    });
                },
            }
            self.sync(child, incoming, changes);
        }

        if let Some(entry) = self.entries.get_mut(&id) {
            entry.children = current;
        }
    }

    fn forget(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(entry) = self.entries.remove(&current) {
                stack.extend(entry.children);
            }
        }
    }
}
