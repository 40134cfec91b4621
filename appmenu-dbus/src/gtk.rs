//! Client of the GTK menu model (`org.gtk.Menus` plus `org.gtk.Actions`).
//!
//! GTK exports menus as numbered groups of flat item lists. Sections and submenus are links
//! to other `(group, menu)` pairs, which may live in groups not subscribed yet. Items carry
//! no ids, so [GtkMirror] hands out synthetic [NodeId]s as entries are materialized and keeps
//! the action state needed for enabled flags and toggles.

use std::collections::{HashMap, HashSet};
use std::pin::Pin;

use appmenu_core::model::{ItemProperties, MenuKind, NodeId, Property, ToggleKind};
use appmenu_core::resolver::MenuLocator;
use appmenu_core::source::{ItemEvent, RemoteNode, SourceChange};
use futures::stream::{select_all, Stream, StreamExt};
use log::{debug, info};
use zbus::proxy;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{OwnedValue, Signature, Value};
use zbus::Connection;

use crate::client::{self, ClientChannels, ClientRequest, RemoteClient};
use crate::properties::{as_bool, as_i32, as_str, format_gtk_accel, peel, strip_mnemonics};
use crate::{Error, Result};

/// Root of the synthetic id space.
pub const ROOT_ID: NodeId = NodeId(0);

/// A `(group, menu)` pair.
pub type MenuKey = (u32, u32);

/// Items of one `(group, menu)` as returned by `Start`.
pub type MenuContents = (u32, u32, Vec<HashMap<String, OwnedValue>>);

/// One `Changed` entry: group, menu, position, removed count, added items.
pub type MenuDelta = (u32, u32, u32, u32, Vec<HashMap<String, OwnedValue>>);

/// Result of `DescribeAll`: enabled, parameter type, state.
pub type ActionDescription = (bool, Signature, Vec<OwnedValue>);

mod menus_proxy {
    use super::*;

    #[proxy(interface = "org.gtk.Menus")]
    pub trait GtkMenus {
        fn start(&self, groups: &[u32]) -> zbus::Result<Vec<MenuContents>>;

        fn end(&self, groups: &[u32]) -> zbus::Result<()>;

        #[zbus(signal, name = "Changed")]
        fn menus_changed(&self, changes: Vec<MenuDelta>) -> zbus::Result<()>;
    }
}

pub use menus_proxy::{
    Changed as MenusChanged, ChangedArgs as MenusChangedArgs, ChangedStream as MenusChangedStream,
    GtkMenusProxy, GtkMenusProxyBlocking,
};

mod actions_proxy {
    use super::*;

    #[proxy(interface = "org.gtk.Actions")]
    pub trait GtkActions {
        fn describe_all(&self) -> zbus::Result<HashMap<String, ActionDescription>>;

        fn activate(
            &self,
            action_name: &str,
            parameter: &[Value<'_>],
            platform_data: HashMap<&str, Value<'_>>,
        ) -> zbus::Result<()>;

        #[zbus(signal, name = "Changed")]
        fn actions_changed(
            &self,
            removals: Vec<String>,
            enable_changes: HashMap<String, bool>,
            state_changes: HashMap<String, OwnedValue>,
            additions: HashMap<String, ActionDescription>,
        ) -> zbus::Result<()>;
    }
}

pub use actions_proxy::{
    Changed as ActionsChanged, ChangedArgs as ActionsChangedArgs, ChangedStream as ActionsChangedStream,
    GtkActionsProxy, GtkActionsProxyBlocking,
};

/// The subset of GVariant values that matter for toggles and activation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionValue {
    /// `b`
    Bool(bool),
    /// `i` or `u`
    Int(i32),
    /// `s`
    Str(String),
}

impl ActionValue {
    /// Decode a state or target. Other types are not representable.
    pub fn from_value(value: &Value<'_>) -> Option<Self> {
        if let Some(flag) = as_bool(value) {
            return Some(ActionValue::Bool(flag));
        }
        if let Some(text) = as_str(value) {
            return Some(ActionValue::Str(text.to_string()));
        }
        as_i32(value).map(ActionValue::Int)
    }

    /// Encode as a wire value.
    pub fn to_value(&self) -> Value<'static> {
        match self {
            ActionValue::Bool(flag) => Value::from(*flag),
            ActionValue::Int(number) => Value::from(*number),
            ActionValue::Str(text) => Value::from(text.clone()),
        }
    }
}

/// Enabled flag and state of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionState {
    pub enabled: bool,
    pub state: Option<ActionValue>,
}

impl ActionState {
    fn from_description(description: &ActionDescription) -> Self {
        Self {
            enabled: description.0,
            state: description.2.first().and_then(|state| ActionValue::from_value(state)),
        }
    }
}

/// One item of a GTK menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GtkEntry {
    /// Label with mnemonics stripped.
    pub label: String,
    /// Fully qualified action such as `app.quit`.
    pub action: Option<String>,
    pub target: Option<ActionValue>,
    /// Accelerator in `Ctrl+Q` form.
    pub accelerator: String,
    pub section: Option<MenuKey>,
    pub submenu: Option<MenuKey>,
}

fn as_link(value: &Value<'_>) -> Option<MenuKey> {
    let Value::Structure(structure) = peel(value) else {
        return None;
    };
    match structure.fields() {
        [group, menu] => match (peel(group), peel(menu)) {
            (Value::U32(group), Value::U32(menu)) => Some((*group, *menu)),
            _ => None,
        },
        _ => None,
    }
}

impl GtkEntry {
    /// A plain labelled item bound to `action`.
    pub fn item(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    /// A submenu entry linking to `link`.
    pub fn submenu(label: impl Into<String>, link: MenuKey) -> Self {
        Self {
            label: label.into(),
            submenu: Some(link),
            ..Self::default()
        }
    }

    /// A section linking to `link`.
    pub fn section(link: MenuKey) -> Self {
        Self {
            section: Some(link),
            ..Self::default()
        }
    }

    /// Decode an item dictionary.
    pub fn decode(attributes: &HashMap<String, OwnedValue>) -> Self {
        let text = |key: &str| attributes.get(key).and_then(|value| as_str(value)).map(str::to_string);
        Self {
            label: text("label").map(|label| strip_mnemonics(&label)).unwrap_or_default(),
            action: text("action").filter(|action| !action.is_empty()),
            target: attributes.get("target").and_then(|value| ActionValue::from_value(value)),
            accelerator: text("accel").map(|accel| format_gtk_accel(&accel)).unwrap_or_default(),
            section: attributes.get(":section").and_then(|value| as_link(value)),
            submenu: attributes.get(":submenu").and_then(|value| as_link(value)),
        }
    }

    fn link(&self) -> Option<MenuKey> {
        self.section.or(self.submenu)
    }
}

#[derive(Debug, Clone)]
struct Placed {
    entry: GtkEntry,
    properties: ItemProperties,
}

/// Mirror of a GTK menu model in terms of [SourceChange]s.
#[derive(Debug)]
pub struct GtkMirror {
    /// Last known contents of every menu, materialized or not.
    menus: HashMap<MenuKey, Vec<GtkEntry>>,
    /// Node that displays each linked menu.
    owners: HashMap<MenuKey, NodeId>,
    /// Node ids of materialized menus, in order.
    placed: HashMap<MenuKey, Vec<NodeId>>,
    items: HashMap<NodeId, Placed>,
    actions: HashMap<String, ActionState>,
    next_id: i32,
}

impl Default for GtkMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl GtkMirror {
    /// An empty mirror whose root displays menu `(0, 0)`.
    pub fn new() -> Self {
        let mut owners = HashMap::new();
        owners.insert((0, 0), ROOT_ID);
        Self {
            menus: HashMap::new(),
            owners,
            placed: HashMap::new(),
            items: HashMap::new(),
            actions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Number of materialized items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is materialized yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Groups referenced by a displayed link but missing from `subscribed`.
    pub fn wanted_groups(&self, subscribed: &HashSet<u32>) -> Vec<u32> {
        let mut groups: Vec<u32> = self
            .owners
            .keys()
            .map(|(group, _)| *group)
            .filter(|group| !subscribed.contains(group))
            .collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    /// Store the result of `Start` and materialize every menu that has an owner.
    pub fn load(&mut self, contents: impl IntoIterator<Item = (MenuKey, Vec<GtkEntry>)>) -> Vec<SourceChange> {
        let mut changes = Vec::new();
        for (key, entries) in contents {
            if self.placed.contains_key(&key) {
                let count = self.menus.get(&key).map_or(0, Vec::len);
                self.splice(key, 0, count, entries, &mut changes);
            } else {
                self.menus.insert(key, entries);
            }
        }
        self.materialize_pending(&mut changes);
        changes
    }

    /// Apply one `Changed` entry.
    pub fn changed(
        &mut self,
        key: MenuKey,
        position: usize,
        removed: usize,
        added: Vec<GtkEntry>,
    ) -> Vec<SourceChange> {
        let mut changes = Vec::new();
        self.splice(key, position, removed, added, &mut changes);
        self.materialize_pending(&mut changes);
        changes
    }

    /// Replace the actions of group `prefix` with a `DescribeAll` result.
    pub fn set_actions(&mut self, prefix: &str, described: &HashMap<String, ActionDescription>) -> Vec<SourceChange> {
        let scope = format!("{prefix}.");
        self.actions.retain(|name, _| !name.starts_with(&scope));
        for (name, description) in described {
            self.actions
                .insert(format!("{scope}{name}"), ActionState::from_description(description));
        }
        self.refresh_items()
    }

    /// Apply an `org.gtk.Actions.Changed` signal for group `prefix`.
    pub fn actions_changed(
        &mut self,
        prefix: &str,
        removals: &[String],
        enable_changes: &HashMap<String, bool>,
        state_changes: &HashMap<String, OwnedValue>,
        additions: &HashMap<String, ActionDescription>,
    ) -> Vec<SourceChange> {
        for name in removals {
            self.actions.remove(&format!("{prefix}.{name}"));
        }
        for (name, enabled) in enable_changes {
            if let Some(action) = self.actions.get_mut(&format!("{prefix}.{name}")) {
                action.enabled = *enabled;
            }
        }
        for (name, state) in state_changes {
            if let Some(action) = self.actions.get_mut(&format!("{prefix}.{name}")) {
                action.state = ActionValue::from_value(state);
            }
        }
        for (name, description) in additions {
            self.actions
                .insert(format!("{prefix}.{name}"), ActionState::from_description(description));
        }
        self.refresh_items()
    }

    /// Action and target to activate when `id` is clicked.
    pub fn activation(&self, id: NodeId) -> Option<(&str, Option<&ActionValue>)> {
        let placed = self.items.get(&id)?;
        let action = placed.entry.action.as_deref()?;
        Some((action, placed.entry.target.as_ref()))
    }

    fn properties_for(&self, entry: &GtkEntry) -> ItemProperties {
        let kind = if entry.section.is_some() {
            MenuKind::Section
        } else if entry.submenu.is_some() {
            MenuKind::SubMenu
        } else {
            MenuKind::Item
        };
        let action = entry.action.as_ref().and_then(|name| self.actions.get(name));
        let (toggle_kind, toggle_state) = match action.and_then(|action| action.state.as_ref()) {
            Some(ActionValue::Bool(checked)) if entry.target.is_none() => (ToggleKind::Checkmark, *checked),
            Some(state) if entry.target.is_some() => (ToggleKind::Radio, entry.target.as_ref() == Some(state)),
            _ => (ToggleKind::None, false),
        };
        ItemProperties {
            kind,
            label: entry.label.clone(),
            icon: None,
            enabled: action.map_or(true, |action| action.enabled),
            visible: true,
            toggle_kind,
            toggle_state,
            accelerator: entry.accelerator.clone(),
            action: entry.action.clone().unwrap_or_default(),
        }
    }

    fn refresh_items(&mut self) -> Vec<SourceChange> {
        let mut changes = Vec::new();
        let mut ids: Vec<NodeId> = self.items.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let Some(placed) = self.items.get(&id) else {
                continue;
            };
            let properties = self.properties_for(&placed.entry);
            let diff: Vec<Property> = placed.properties.changes_to(&properties);
            if diff.is_empty() {
                continue;
            }
            changes.extend(
                diff.into_iter()
                    .map(|property| SourceChange::PropertyChanged { id, property }),
            );
            if let Some(placed) = self.items.get_mut(&id) {
                placed.properties = properties;
            }
        }
        changes
    }

    fn splice(
        &mut self,
        key: MenuKey,
        position: usize,
        removed: usize,
        added: Vec<GtkEntry>,
        changes: &mut Vec<SourceChange>,
    ) {
        let contents = self.menus.entry(key).or_default();
        let start = position.min(contents.len());
        let end = (start + removed).min(contents.len());
        contents.splice(start..end, added.iter().cloned());

        let Some(owner) = self.owners.get(&key).copied() else {
            return;
        };
        let Some(mut ids) = self.placed.remove(&key) else {
            return;
        };
        let start = position.min(ids.len());
        let end = (start + removed).min(ids.len());
        for id in ids.drain(start..end).collect::<Vec<_>>() {
            self.forget(id);
            changes.push(SourceChange::Destroyed { id });
        }
        for (offset, entry) in added.into_iter().enumerate() {
            let id = self.place(owner, start + offset, entry, changes);
            ids.insert(start + offset, id);
        }
        self.placed.insert(key, ids);
    }

    fn place(&mut self, owner: NodeId, position: usize, entry: GtkEntry, changes: &mut Vec<SourceChange>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let properties = self.properties_for(&entry);
        changes.push(SourceChange::ChildAdded {
            parent: owner,
            position,
            node: RemoteNode::new(id, properties.clone()),
        });
        if let Some(link) = entry.link() {
            self.owners.insert(link, id);
        }
        self.items.insert(id, Placed { entry, properties });
        id
    }

    /// Materialize every owned menu whose contents are known but not yet displayed.
    fn materialize_pending(&mut self, changes: &mut Vec<SourceChange>) {
        loop {
            let pending: Vec<MenuKey> = self
                .owners
                .keys()
                .filter(|key| !self.placed.contains_key(key) && self.menus.contains_key(key))
                .copied()
                .collect();
            if pending.is_empty() {
                break;
            }
            for key in pending {
                let (Some(owner), Some(entries)) = (self.owners.get(&key).copied(), self.menus.get(&key).cloned())
                else {
                    continue;
                };
                let ids = entries
                    .into_iter()
                    .enumerate()
                    .map(|(position, entry)| self.place(owner, position, entry, changes))
                    .collect();
                self.placed.insert(key, ids);
            }
        }
    }

    fn forget(&mut self, id: NodeId) {
        let Some(placed) = self.items.remove(&id) else {
            return;
        };
        let Some(link) = placed.entry.link() else {
            return;
        };
        if self.owners.get(&link) == Some(&id) {
            self.owners.remove(&link);
            for child in self.placed.remove(&link).unwrap_or_default() {
                self.forget(child);
            }
        }
    }
}

fn decode_entries(items: &[HashMap<String, OwnedValue>]) -> Vec<GtkEntry> {
    items.iter().map(GtkEntry::decode).collect()
}

type ActionStream = Pin<Box<dyn Stream<Item = (String, ActionsChanged)> + Send>>;

struct ActionGroup {
    prefix: String,
    proxy: GtkActionsProxy<'static>,
}

/// Subscribe to every group the mirror still needs and load their contents.
async fn start_wanted(
    menus: &GtkMenusProxy<'static>,
    mirror: &mut GtkMirror,
    subscribed: &mut HashSet<u32>,
) -> Result<Vec<SourceChange>> {
    let mut changes = Vec::new();
    loop {
        let wanted = mirror.wanted_groups(subscribed);
        if wanted.is_empty() {
            return Ok(changes);
        }
        subscribed.extend(wanted.iter().copied());
        let contents = menus.start(&wanted).await?;
        changes.extend(mirror.load(
            contents
                .iter()
                .map(|(group, menu, items)| ((*group, *menu), decode_entries(items))),
        ));
    }
}

/// Connect to the GTK menu model described by `locator` and start mirroring it.
pub async fn connect(connection: &Connection, locator: &MenuLocator) -> Result<RemoteClient> {
    let (Some(sender), Some(menubar_path)) = (locator.sender.as_deref(), locator.menubar_path.as_deref()) else {
        return Err(Error::Layout("locator lacks a sender or menubar path"));
    };
    let menus = GtkMenusProxy::builder(connection)
        .destination(sender.to_string())?
        .path(menubar_path.to_string())?
        .cache_properties(CacheProperties::No)
        .build()
        .await?;
    let menu_changes = menus.receive_menus_changed().await?;

    let mut mirror = GtkMirror::new();
    let mut groups = Vec::new();
    let mut streams: Vec<ActionStream> = Vec::new();
    for (prefix, path) in [
        ("app", locator.application_path.as_deref()),
        ("win", locator.window_path.as_deref()),
        ("unity", Some(menubar_path)),
    ] {
        let Some(path) = path.filter(|path| !path.is_empty()) else {
            continue;
        };
        let proxy = GtkActionsProxy::builder(connection)
            .destination(sender.to_string())?
            .path(path.to_string())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;
        let stream = proxy.receive_actions_changed().await?;
        match proxy.describe_all().await {
            Ok(described) => {
                mirror.set_actions(prefix, &described);
            },
            Err(err) => debug!("No {prefix} actions at {path}: {err}"),
        }
        let owned_prefix = prefix.to_string();
        streams.push(Box::pin(stream.map(move |signal| (owned_prefix.clone(), signal))));
        groups.push(ActionGroup {
            prefix: prefix.to_string(),
            proxy,
        });
    }

    let mut subscribed = HashSet::new();
    let changes = start_wanted(&menus, &mut mirror, &mut subscribed).await?;

    info!("Creating GTK menu on {sender}, {menubar_path}");
    let (client, channels) = client::channel(ROOT_ID, format!("{sender}{menubar_path}"));
    channels.send_all(changes);
    tokio::spawn(serve(menus, groups, mirror, subscribed, channels, menu_changes, select_all(streams)));
    Ok(client)
}

async fn activate(groups: &[ActionGroup], action: &str, target: Option<&ActionValue>) {
    let Some((prefix, name)) = action.split_once('.') else {
        debug!("Unscoped GTK action {action}");
        return;
    };
    let Some(group) = groups.iter().find(|group| group.prefix == prefix) else {
        debug!("No action group for {action}");
        return;
    };
    let parameter: Vec<Value<'_>> = target.map(ActionValue::to_value).into_iter().collect();
    if let Err(err) = group.proxy.activate(name, &parameter, HashMap::new()).await {
        debug!("Activate({action}) failed: {err}");
    }
}

async fn serve<M, A>(
    menus: GtkMenusProxy<'static>,
    groups: Vec<ActionGroup>,
    mut mirror: GtkMirror,
    mut subscribed: HashSet<u32>,
    mut channels: ClientChannels,
    menu_changes: M,
    action_changes: A,
) where
    M: Stream<Item = MenusChanged> + Send + 'static,
    A: Stream<Item = (String, ActionsChanged)> + Send + 'static,
{
    let mut menu_changes = Box::pin(menu_changes);
    let mut action_changes = Box::pin(action_changes);
    let name = menus.inner().path().to_string();

    loop {
        tokio::select! {
            request = channels.next_request() => match request {
                Some(ClientRequest::Event(id, ItemEvent::Clicked)) => match mirror.activation(id) {
                    Some((action, target)) => activate(&groups, action, target).await,
                    None => debug!("GTK item {id} has no action"),
                },
                // The model is preloaded, there is nothing to fetch on show.
                Some(ClientRequest::Event(..)) | Some(ClientRequest::AboutToShow(_)) => {},
                None => break,
            },
            Some(signal) = menu_changes.next() => {
                let deltas = match signal.args() {
                    Ok(args) => args.changes().clone(),
                    Err(err) => {
                        debug!("Malformed org.gtk.Menus.Changed: {err}");
                        continue;
                    },
                };
                let mut changes = Vec::new();
                for (group, menu, position, removed, added) in &deltas {
                    changes.extend(mirror.changed(
                        (*group, *menu),
                        *position as usize,
                        *removed as usize,
                        decode_entries(added),
                    ));
                }
                match start_wanted(&menus, &mut mirror, &mut subscribed).await {
                    Ok(started) => changes.extend(started),
                    Err(err) => debug!("Failed to start linked GTK menus: {err}"),
                }
                channels.send_all(changes);
            },
            Some((prefix, signal)) = action_changes.next() => match signal.args() {
                Ok(args) => {
                    let changes = mirror.actions_changed(
                        &prefix,
                        args.removals(),
                        args.enable_changes(),
                        args.state_changes(),
                        args.additions(),
                    );
                    channels.send_all(changes);
                },
                Err(err) => debug!("Malformed org.gtk.Actions.Changed: {err}"),
            },
            else => break,
        }
    }

    let subscribed: Vec<u32> = subscribed.into_iter().collect();
    if let Err(err) = menus.end(&subscribed).await {
        debug!("Failed to end GTK menu subscription: {err}");
    }
    debug!("Stopped mirroring {name}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn added(changes: &[SourceChange]) -> Vec<(NodeId, usize, NodeId, String)> {
        changes
            .iter()
            .filter_map(|change| match change {
                SourceChange::ChildAdded { parent, position, node } => {
                    Some((*parent, *position, node.id, node.properties.label.clone()))
                },
                _ => None,
            })
            .collect()
    }

    fn description(enabled: bool, state: Option<Value<'static>>) -> ActionDescription {
        let state = state
            .map(|value| OwnedValue::try_from(value).unwrap())
            .into_iter()
            .collect();
        (enabled, Signature::try_from("s").unwrap(), state)
    }

    #[test]
    fn test_links_wait_for_their_group() {
        let mut mirror = GtkMirror::new();
        assert_eq!(mirror.wanted_groups(&HashSet::new()), vec![0]);

        let changes = mirror.load([((0, 0), vec![GtkEntry::submenu("File", (1, 0))])]);
        assert_eq!(added(&changes), vec![(ROOT_ID, 0, NodeId(1), "File".to_string())]);
        assert_eq!(mirror.wanted_groups(&HashSet::from([0])), vec![1]);

        let changes = mirror.load([(
            (1, 0),
            vec![GtkEntry::section((1, 1)), GtkEntry::item("Quit", "app.quit")],
        )]);
        assert_eq!(
            added(&changes),
            vec![
                (NodeId(1), 0, NodeId(2), String::new()),
                (NodeId(1), 1, NodeId(3), "Quit".to_string())
            ]
        );
        let changes = mirror.load([((1, 1), vec![GtkEntry::item("New", "app.new")])]);
        assert_eq!(added(&changes), vec![(NodeId(2), 0, NodeId(4), "New".to_string())]);
        assert_eq!(mirror.len(), 4);
    }

    #[test]
    fn test_changed_replaces_items_and_forgets_links() {
        let mut mirror = GtkMirror::new();
        mirror.load([
            ((0, 0), vec![GtkEntry::submenu("File", (0, 1)), GtkEntry::submenu("Edit", (0, 2))]),
            ((0, 1), vec![GtkEntry::item("Open", "app.open")]),
            ((0, 2), vec![GtkEntry::item("Copy", "win.copy")]),
        ]);
        assert_eq!(mirror.len(), 4);

        let changes = mirror.changed((0, 0), 0, 1, vec![GtkEntry::item("About", "app.about")]);
        let destroyed: Vec<NodeId> = changes
            .iter()
            .filter_map(|change| match change {
                SourceChange::Destroyed { id } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(destroyed.len(), 1);
        assert_eq!(added(&changes).len(), 1);
        assert_eq!(added(&changes)[0].1, 0);
        // The File submenu and its Open item are gone from the model.
        assert_eq!(mirror.len(), 3);
    }

    #[test]
    fn test_actions_drive_enabled_and_toggles() {
        let mut mirror = GtkMirror::new();
        let mut radio = GtkEntry::item("Large", "win.size");
        radio.target = Some(ActionValue::Str("large".to_string()));
        mirror.load([(
            (0, 0),
            vec![GtkEntry::item("Quit", "app.quit"), GtkEntry::item("Wrap", "win.wrap"), radio],
        )]);

        let mut app = HashMap::new();
        app.insert("quit".to_string(), description(false, None));
        let changes = mirror.set_actions("app", &app);
        assert_eq!(
            changes,
            vec![SourceChange::PropertyChanged {
                id: NodeId(1),
                property: Property::Enabled(false)
            }]
        );

        let mut win = HashMap::new();
        win.insert("wrap".to_string(), description(true, Some(Value::from(true))));
        win.insert("size".to_string(), description(true, Some(Value::from("small"))));
        let changes = mirror.set_actions("win", &win);
        assert!(changes.contains(&SourceChange::PropertyChanged {
            id: NodeId(2),
            property: Property::ToggleKind(ToggleKind::Checkmark)
        }));
        assert!(changes.contains(&SourceChange::PropertyChanged {
            id: NodeId(3),
            property: Property::ToggleKind(ToggleKind::Radio)
        }));

        let mut states = HashMap::new();
        states.insert("size".to_string(), OwnedValue::try_from(Value::from("large")).unwrap());
        let changes = mirror.actions_changed("win", &[], &HashMap::new(), &states, &HashMap::new());
        assert_eq!(
            changes,
            vec![SourceChange::PropertyChanged {
                id: NodeId(3),
                property: Property::ToggleState(true)
            }]
        );
    }

    #[test]
    fn test_activation_carries_target() {
        let mut mirror = GtkMirror::new();
        let mut entry = GtkEntry::item("Large", "win.size");
        entry.target = Some(ActionValue::Int(3));
        mirror.load([((0, 0), vec![entry, GtkEntry::submenu("File", (0, 1))])]);

        assert_eq!(mirror.activation(NodeId(1)), Some(("win.size", Some(&ActionValue::Int(3)))));
        assert_eq!(mirror.activation(NodeId(2)), None);
        assert_eq!(ActionValue::Int(3).to_value(), Value::from(3i32));
    }

    #[test]
    fn test_decode_entry() {
        let mut attributes = HashMap::new();
        attributes.insert("label".to_string(), OwnedValue::try_from(Value::from("_Quit")).unwrap());
        attributes.insert("action".to_string(), OwnedValue::try_from(Value::from("app.quit")).unwrap());
        attributes.insert("accel".to_string(), OwnedValue::try_from(Value::from("<Primary>q")).unwrap());
        let entry = GtkEntry::decode(&attributes);
        assert_eq!(entry.label, "Quit");
        assert_eq!(entry.action.as_deref(), Some("app.quit"));
        assert_eq!(entry.accelerator, "Ctrl+Q");
        assert_eq!(entry.link(), None);
    }
}
