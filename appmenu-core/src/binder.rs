//! Binding between model nodes and rendered widgets.
//!
//! The [Binder] owns every [MenuWidget] of one menu tree and keeps at most one widget per
//! node. Widgets are built on demand: asking for a node builds the widgets on its path, and
//! the children of a freshly built container are only built when the container is opened or
//! when [Binder::run_idle] gets to it.

use std::collections::{HashMap, VecDeque};

use log::{debug, warn};

use crate::focus::FocusTarget;
use crate::model::{MenuKind, MenuTree, ModelEvent, NodeId};
use crate::popup::MenuId;
use crate::widget::{MenuWidget, WidgetId, WidgetSettings};

/// What the binder needs from whoever owns the popups and keyboard focus.
pub trait MenuHost {
    /// Create the popup opened by `launcher`, nested in `parent`.
    fn create_menu(&mut self, launcher: WidgetId, parent: Option<MenuId>, is_root: bool) -> MenuId;

    /// Destroy a popup created by [MenuHost::create_menu].
    fn release_menu(&mut self, menu: MenuId);

    /// Current keyboard focus.
    fn focus(&self) -> Option<FocusTarget>;

    /// Move keyboard focus.
    fn set_focus(&mut self, focus: Option<FocusTarget>);
}

/// Widget store for one [MenuTree].
#[derive(Debug, Default)]
pub struct Binder {
    widgets: HashMap<WidgetId, MenuWidget>,
    bindings: HashMap<NodeId, WidgetId>,
    menus: HashMap<MenuId, WidgetId>,
    idle: VecDeque<WidgetId>,
    next_id: u64,
    settings: WidgetSettings,
    root: Option<WidgetId>,
}

impl Binder {
    /// Creates an empty binder.
    pub fn new(settings: WidgetSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// The widget of a node, building it and its ancestors when missing.
    ///
    /// An existing widget of the wrong kind is rebuilt. Returns `None` for nodes that are not
    /// reachable from the tree root.
    pub fn materialize(&mut self, tree: &MenuTree, node: NodeId, host: &mut dyn MenuHost) -> Option<WidgetId> {
        let kind = tree.node(node)?.kind();
        if let Some(widget) = self.widget_for(node) {
            if widget.kind() == kind {
                return Some(widget.id());
            }
            return self.rebuild(tree, node, host);
        }

        if node == tree.root() {
            let id = self.build(tree, node, None, 0, host)?;
            self.root = Some(id);
            return Some(id);
        }

        let parent = tree.parent(node)?;
        let parent_widget = self.materialize(tree, parent, host)?;
        self.populate(tree, parent_widget, host);
        self.bindings.get(&node).copied()
    }

    /// Build the children of queued containers, at most `budget` containers. Returns how many
    /// were populated.
    pub fn run_idle(&mut self, tree: &MenuTree, host: &mut dyn MenuHost, budget: usize) -> usize {
        let mut done = 0;
        while done < budget {
            let Some(id) = self.idle.pop_front() else {
                break;
            };
            if self.widgets.get(&id).is_some_and(|widget| !widget.is_populated()) {
                self.populate(tree, id, host);
                done += 1;
            }
        }
        done
    }

    /// Build the children of a container right away, including those of nested sections.
    pub fn ensure_populated(&mut self, tree: &MenuTree, id: WidgetId, host: &mut dyn MenuHost) {
        self.populate(tree, id, host);
        let sections: Vec<WidgetId> = self
            .children(id)
            .iter()
            .copied()
            .filter(|child| self.widgets.get(child).map(MenuWidget::kind) == Some(MenuKind::Section))
            .collect();
        for section in sections {
            self.ensure_populated(tree, section, host);
        }
    }

    /// Bring the widgets in line with one model event. `tree` must be the tree that produced
    /// it, in its current state.
    pub fn handle(&mut self, tree: &MenuTree, event: &ModelEvent, host: &mut dyn MenuHost) {
        match *event {
            ModelEvent::Changed(node, name) => {
                let settings = self.settings;
                if let (Some(id), Some(model)) = (self.bindings.get(&node), tree.node(node)) {
                    if let Some(widget) = self.widgets.get_mut(id) {
                        widget.sync(model.properties(), name, &settings);
                    }
                }
            },
            ModelEvent::KindChanged(node) => {
                if self.bindings.contains_key(&node) {
                    self.rebuild(tree, node, host);
                }
            },
            ModelEvent::ChildAdded(parent, child, position) => {
                let Some(parent_widget) = self.populated_widget(parent) else {
                    return;
                };
                // Later events of the same batch may already have moved or dropped the child.
                if tree.parent(child) != Some(parent) {
                    return;
                }
                if let Some(existing) = self.bindings.get(&child).copied() {
                    if self.widgets.get(&existing).and_then(MenuWidget::parent) == Some(parent_widget) {
                        self.sync_order(tree, parent_widget);
                        return;
                    }
                    self.destroy_widget(existing, host);
                }
                self.build(tree, child, Some(parent_widget), position, host);
                self.sync_order(tree, parent_widget);
            },
            ModelEvent::ChildMoved(parent, ..) => {
                if let Some(parent_widget) = self.populated_widget(parent) {
                    self.sync_order(tree, parent_widget);
                }
            },
            ModelEvent::ChildRemoved(parent, child) => {
                let Some(id) = self.bindings.get(&child).copied() else {
                    return;
                };
                let parent_widget = self.bindings.get(&parent).copied();
                if parent_widget.is_some() && self.widgets.get(&id).and_then(MenuWidget::parent) == parent_widget {
                    self.destroy_widget(id, host);
                }
            },
            ModelEvent::Destroyed(node) => {
                if let Some(id) = self.bindings.get(&node).copied() {
                    self.destroy_widget(id, host);
                }
            },
            ModelEvent::ChildrenEmpty(_) => {},
        }
    }

    /// Destroy a widget and everything below it. Returns how many widgets were destroyed.
    ///
    /// Focus held inside the destroyed subtree moves to the nearest living launcher above it.
    pub fn destroy_widget(&mut self, id: WidgetId, host: &mut dyn MenuHost) -> usize {
        let Some(parent) = self.widgets.get(&id).map(MenuWidget::parent) else {
            return 0;
        };
        let subtree = self.subtree(id);
        let focus_inside = match host.focus() {
            Some(FocusTarget::Widget(widget)) => subtree.contains(&widget),
            Some(FocusTarget::Menu(menu)) => self.menus.get(&menu).is_some_and(|owner| subtree.contains(owner)),
            _ => false,
        };

        if let Some(container) = parent
            .and_then(|parent| self.widgets.get_mut(&parent))
            .and_then(|parent| parent.container.as_mut())
        {
            container.children.retain(|child| *child != id);
        }

        for widget_id in &subtree {
            let Some(widget) = self.widgets.remove(widget_id) else {
                continue;
            };
            if self.bindings.get(&widget.node()) == Some(widget_id) {
                self.bindings.remove(&widget.node());
            }
            if let Some(menu) = widget.menu {
                self.menus.remove(&menu);
                host.release_menu(menu);
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }

        if focus_inside {
            let target = self.focus_fallback(parent);
            debug!("Moving focus out of destroyed widget {id} to {target:?}");
            host.set_focus(target);
        }
        subtree.len()
    }

    /// Destroy every widget.
    pub fn clear(&mut self, host: &mut dyn MenuHost) {
        if let Some(root) = self.root {
            self.destroy_widget(root, host);
        }
        let rest: Vec<WidgetId> = self.widgets.keys().copied().collect();
        for id in rest {
            self.destroy_widget(id, host);
        }
        self.idle.clear();
    }

    /// The node to activate when the widget is clicked, if it can be.
    pub fn activate(&self, id: WidgetId) -> Option<NodeId> {
        let widget = self.widgets.get(&id)?;
        (widget.kind() == MenuKind::Item && widget.is_sensitive() && widget.is_visible()).then(|| widget.node())
    }

    /// Items shown in the popup of a container, with sections flattened in place.
    pub fn menu_items(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut items = Vec::new();
        self.collect_items(id, &mut items);
        items
    }

    /// Replace the widget settings and re-apply them. Returns how many widgets changed.
    pub fn apply_settings(&mut self, settings: WidgetSettings) -> usize {
        self.settings = settings;
        self.widgets
            .values_mut()
            .map(|widget| widget.apply_settings(&settings))
            .filter(|changed| *changed)
            .count()
    }

    /// Highlight a widget.
    pub fn set_active(&mut self, id: WidgetId, active: bool) -> bool {
        self.widgets.get_mut(&id).is_some_and(|widget| widget.set_active(active))
    }

    /// Look up a widget.
    pub fn widget(&self, id: WidgetId) -> Option<&MenuWidget> {
        self.widgets.get(&id)
    }

    /// The widget bound to a node.
    pub fn widget_for(&self, node: NodeId) -> Option<&MenuWidget> {
        self.bindings.get(&node).and_then(|id| self.widgets.get(id))
    }

    /// The widget whose popup is `menu`.
    pub fn menu_owner(&self, menu: MenuId) -> Option<WidgetId> {
        self.menus.get(&menu).copied()
    }

    /// The popup a widget is shown in.
    pub fn popup_of(&self, id: WidgetId) -> Option<MenuId> {
        self.enclosing_menu(self.widgets.get(&id)?.parent())
    }

    /// The root widget, once built.
    pub fn root(&self) -> Option<WidgetId> {
        self.root
    }

    /// Child widgets of a container.
    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        self.widgets.get(&id).map(MenuWidget::children).unwrap_or(&[])
    }

    /// Number of live widgets.
    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    /// Whether no widget exists.
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Number of containers waiting for [Binder::run_idle].
    pub fn pending_idle(&self) -> usize {
        self.idle.len()
    }

    /// Current settings.
    pub fn settings(&self) -> WidgetSettings {
        self.settings
    }

    fn build(
        &mut self,
        tree: &MenuTree,
        node: NodeId,
        parent: Option<WidgetId>,
        position: usize,
        host: &mut dyn MenuHost,
    ) -> Option<WidgetId> {
        let properties = tree.node(node)?.properties().clone();
        if let Some(old) = self.bindings.get(&node).copied() {
            self.destroy_widget(old, host);
        }

        self.next_id += 1;
        let id = WidgetId(self.next_id);
        let mut widget = MenuWidget::new(id, node, &properties, parent, &self.settings);
        if matches!(properties.kind, MenuKind::Root | MenuKind::SubMenu) {
            let parent_menu = self.enclosing_menu(parent);
            let menu = host.create_menu(id, parent_menu, properties.kind == MenuKind::Root);
            widget.menu = Some(menu);
            self.menus.insert(menu, id);
        }
        if widget.container.is_some() {
            self.idle.push_back(id);
        }

        if let Some(container) = parent
            .and_then(|parent| self.widgets.get_mut(&parent))
            .and_then(|parent| parent.container.as_mut())
        {
            let position = position.min(container.children.len());
            container.children.insert(position, id);
        }
        self.widgets.insert(id, widget);
        self.bindings.insert(node, id);
        Some(id)
    }

    fn rebuild(&mut self, tree: &MenuTree, node: NodeId, host: &mut dyn MenuHost) -> Option<WidgetId> {
        let old = self.bindings.get(&node).copied()?;
        let parent = self.widgets.get(&old).and_then(MenuWidget::parent);
        let position = parent
            .map(|parent| self.children(parent).iter().position(|child| *child == old).unwrap_or(0))
            .unwrap_or(0);
        let was_root = self.root == Some(old);

        self.destroy_widget(old, host);
        let id = self.build(tree, node, parent, position, host)?;
        if was_root {
            self.root = Some(id);
        }
        debug!("Rebuilt widget of {node} as {id}");
        Some(id)
    }

    fn populate(&mut self, tree: &MenuTree, id: WidgetId, host: &mut dyn MenuHost) {
        let Some(widget) = self.widgets.get_mut(&id) else {
            return;
        };
        let node = widget.node();
        match widget.container.as_mut() {
            Some(container) if !container.populated => container.populated = true,
            _ => return,
        }

        for (position, child) in tree.children(node).to_vec().into_iter().enumerate() {
            if self.bindings.contains_key(&child) {
                warn!("Node {child} already has a widget while populating {node}");
                continue;
            }
            self.build(tree, child, Some(id), position, host);
        }
    }

    fn populated_widget(&self, node: NodeId) -> Option<WidgetId> {
        self.widget_for(node)
            .filter(|widget| widget.container.is_some() && widget.is_populated())
            .map(MenuWidget::id)
    }

    fn sync_order(&mut self, tree: &MenuTree, id: WidgetId) {
        let Some(node) = self.widgets.get(&id).map(MenuWidget::node) else {
            return;
        };
        let ordered: Vec<WidgetId> = tree
            .children(node)
            .iter()
            .filter_map(|child| self.bindings.get(child).copied())
            .filter(|child| self.widgets.get(child).and_then(MenuWidget::parent) == Some(id))
            .collect();
        if let Some(container) = self.widgets.get_mut(&id).and_then(|widget| widget.container.as_mut()) {
            let stray: Vec<WidgetId> = container
                .children
                .iter()
                .copied()
                .filter(|child| !ordered.contains(child))
                .collect();
            container.children = ordered;
            container.children.extend(stray);
        }
    }

    fn enclosing_menu(&self, mut cursor: Option<WidgetId>) -> Option<MenuId> {
        while let Some(id) = cursor {
            let widget = self.widgets.get(&id)?;
            if let Some(menu) = widget.menu {
                return Some(menu);
            }
            cursor = widget.parent();
        }
        None
    }

    fn focus_fallback(&self, mut cursor: Option<WidgetId>) -> Option<FocusTarget> {
        while let Some(id) = cursor {
            let widget = self.widgets.get(&id)?;
            match widget.kind() {
                MenuKind::SubMenu => return Some(FocusTarget::Widget(id)),
                MenuKind::Root => return Some(FocusTarget::Launcher),
                _ => cursor = widget.parent(),
            }
        }
        None
    }

    fn subtree(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        order
    }

    fn collect_items(&self, id: WidgetId, items: &mut Vec<WidgetId>) {
        for child in self.children(id) {
            match self.widgets.get(child).map(MenuWidget::kind) {
                Some(MenuKind::Section) => self.collect_items(*child, items),
                Some(_) => items.push(*child),
                None => {},
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemProperties;

    #[derive(Default)]
    struct Host {
        next: u32,
        released: Vec<MenuId>,
        focus: Option<FocusTarget>,
    }

    impl MenuHost for Host {
        fn create_menu(&mut self, _launcher: WidgetId, _parent: Option<MenuId>, _is_root: bool) -> MenuId {
            self.next += 1;
            MenuId(self.next)
        }

        fn release_menu(&mut self, menu: MenuId) {
            self.released.push(menu);
        }

        fn focus(&self) -> Option<FocusTarget> {
            self.focus
        }

        fn set_focus(&mut self, focus: Option<FocusTarget>) {
            self.focus = focus;
        }
    }

    fn tree() -> MenuTree {
        let mut tree = MenuTree::new(NodeId(0));
        tree.insert(NodeId(1), ItemProperties::labeled(MenuKind::SubMenu, "File"));
        tree.insert(NodeId(2), ItemProperties::labeled(MenuKind::Item, "Open"));
        tree.insert(NodeId(3), ItemProperties::new(MenuKind::Section));
        tree.insert(NodeId(4), ItemProperties::labeled(MenuKind::Item, "Quit"));
        tree.add_child(NodeId(0), 0, NodeId(1)).unwrap();
        tree.add_child(NodeId(1), 0, NodeId(2)).unwrap();
        tree.add_child(NodeId(1), 1, NodeId(3)).unwrap();
        tree.add_child(NodeId(3), 0, NodeId(4)).unwrap();
        tree.flush();
        tree
    }

    fn nodes(binder: &Binder, id: WidgetId) -> Vec<NodeId> {
        binder
            .children(id)
            .iter()
            .filter_map(|child| binder.widget(*child))
            .map(MenuWidget::node)
            .collect()
    }

    #[test]
    fn test_materialize_builds_path_lazily() {
        let tree = tree();
        let mut host = Host::default();
        let mut binder = Binder::new(WidgetSettings::default());

        let file = binder.materialize(&tree, NodeId(1), &mut host).unwrap();
        assert_eq!(binder.len(), 2);
        assert!(!binder.widget(file).unwrap().is_populated());
        assert_eq!(binder.materialize(&tree, NodeId(1), &mut host), Some(file));

        binder.ensure_populated(&tree, file, &mut host);
        let items: Vec<NodeId> = binder
            .menu_items(file)
            .into_iter()
            .filter_map(|id| binder.widget(id))
            .map(MenuWidget::node)
            .collect();
        assert_eq!(items, vec![NodeId(2), NodeId(4)]);
    }

    #[test]
    fn test_idle_populates_level_by_level() {
        let tree = tree();
        let mut host = Host::default();
        let mut binder = Binder::new(WidgetSettings::default());
        binder.materialize(&tree, NodeId(0), &mut host);

        while binder.run_idle(&tree, &mut host, 1) > 0 {}
        assert_eq!(binder.len(), tree.len());
        assert_eq!(binder.pending_idle(), 0);
    }

    #[test]
    fn test_widget_order_follows_model() {
        let mut tree = tree();
        let mut host = Host::default();
        let mut binder = Binder::new(WidgetSettings::default());
        let (_sub, inbox) = tree.queue();
        let file = binder.materialize(&tree, NodeId(1), &mut host).unwrap();
        binder.ensure_populated(&tree, file, &mut host);

        tree.insert(NodeId(5), ItemProperties::labeled(MenuKind::Item, "Save"));
        tree.add_child(NodeId(1), 1, NodeId(5)).unwrap();
        tree.move_child(NodeId(1), NodeId(2), 5).unwrap();
        tree.flush();
        for event in inbox.drain() {
            binder.handle(&tree, &event, &mut host);
        }

        assert_eq!(nodes(&binder, file), tree.children(NodeId(1)).to_vec());
        assert_eq!(nodes(&binder, file), vec![NodeId(5), NodeId(3), NodeId(2)]);
    }

    #[test]
    fn test_kind_change_rebuilds_in_place() {
        let mut tree = tree();
        let mut host = Host::default();
        let mut binder = Binder::new(WidgetSettings::default());
        let (_sub, inbox) = tree.queue();
        let file = binder.materialize(&tree, NodeId(1), &mut host).unwrap();
        binder.ensure_populated(&tree, file, &mut host);
        let old = binder.widget_for(NodeId(2)).unwrap().id();

        tree.set_kind(NodeId(2), MenuKind::Separator);
        tree.flush();
        for event in inbox.drain() {
            binder.handle(&tree, &event, &mut host);
        }

        let new = binder.widget_for(NodeId(2)).unwrap();
        assert_ne!(new.id(), old);
        assert_eq!(new.kind(), MenuKind::Separator);
        assert_eq!(binder.children(file)[0], new.id());
    }

    #[test]
    fn test_destroy_releases_menus_and_moves_focus() {
        let mut tree = tree();
        let mut host = Host::default();
        let mut binder = Binder::new(WidgetSettings::default());
        let (_sub, inbox) = tree.queue();
        let file = binder.materialize(&tree, NodeId(1), &mut host).unwrap();
        binder.ensure_populated(&tree, file, &mut host);
        let file_menu = binder.widget(file).unwrap().menu.unwrap();
        let quit = binder.widget_for(NodeId(4)).unwrap().id();
        host.focus = Some(FocusTarget::Widget(quit));

        tree.destroy(NodeId(3));
        tree.flush();
        for event in inbox.drain() {
            binder.handle(&tree, &event, &mut host);
        }
        assert!(binder.widget(quit).is_none());
        assert_eq!(host.focus, Some(FocusTarget::Widget(file)));

        host.focus = Some(FocusTarget::Menu(file_menu));
        tree.destroy(NodeId(1));
        tree.flush();
        for event in inbox.drain() {
            binder.handle(&tree, &event, &mut host);
        }
        assert!(binder.widget_for(NodeId(2)).is_none());
        assert!(host.released.contains(&file_menu));
        assert_eq!(host.focus, Some(FocusTarget::Launcher));
        assert_eq!(binder.len(), 1);
    }
}
