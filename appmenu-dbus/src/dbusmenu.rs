//! Client of the `com.canonical.dbusmenu` protocol.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use appmenu_core::model::NodeId;
use appmenu_core::source::SourceChange;
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use zbus::proxy;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{OwnedValue, Value};
use zbus::Connection;

use crate::client::{self, ClientChannels, ClientRequest, RemoteClient};
use crate::mirror::{LayoutMirror, LayoutNode, RawLayout};
use crate::{Error, Result};

/// Oldest protocol version accepted.
pub const MIN_VERSION: u32 = 2;

/// Id of the dbusmenu root item.
pub const ROOT_ID: NodeId = NodeId(0);

#[proxy(interface = "com.canonical.dbusmenu")]
pub trait DbusMenu {
    fn get_layout(&self, parent_id: i32, recursion_depth: i32, property_names: &[&str]) -> zbus::Result<(u32, RawLayout)>;

    fn about_to_show(&self, id: i32) -> zbus::Result<bool>;

    fn event(&self, id: i32, event_id: &str, data: &Value<'_>, timestamp: u32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn layout_updated(&self, revision: u32, parent: i32) -> zbus::Result<()>;

    #[zbus(signal)]
    fn items_properties_updated(
        &self,
        updated_props: Vec<(i32, HashMap<String, OwnedValue>)>,
        removed_props: Vec<(i32, Vec<String>)>,
    ) -> zbus::Result<()>;

    #[zbus(property)]
    fn version(&self) -> zbus::Result<u32>;
}

/// Read the `Version` property and reject anything older than [MIN_VERSION].
pub async fn validate(proxy: &DbusMenuProxy<'_>) -> Result<u32> {
    let version = proxy.version().await?;
    if version < MIN_VERSION {
        warn!("Incompatible dbusmenu version {version} at {}", proxy.inner().path());
        return Err(Error::IncompatibleVersion(version));
    }
    Ok(version)
}

/// Validate the menu at `sender`/`path`, fetch its layout and start mirroring it.
pub async fn connect(connection: &Connection, sender: &str, path: &str) -> Result<RemoteClient> {
    let proxy = DbusMenuProxy::builder(connection)
        .destination(sender.to_string())?
        .path(path.to_string())?
        .cache_properties(CacheProperties::No)
        .build()
        .await?;
    validate(&proxy).await?;

    // Subscribe before the first layout so no update slips in between.
    let layouts = proxy.receive_layout_updated().await?;
    let properties = proxy.receive_items_properties_updated().await?;

    let mut mirror = LayoutMirror::new(ROOT_ID);
    let (_, raw) = proxy.get_layout(ROOT_ID.0, -1, &[]).await?;
    let changes = mirror.apply_layout(LayoutNode::from_raw(raw)?);

    info!("Creating menu on {sender}, {path}");
    let (client, channels) = client::channel(ROOT_ID, format!("{sender}{path}"));
    channels.send_all(changes);
    tokio::spawn(serve(proxy, mirror, channels, layouts, properties));
    Ok(client)
}

fn timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Fetch the subtree below `parent` again. Unknown parents refresh the whole menu.
async fn refresh(proxy: &DbusMenuProxy<'static>, mirror: &mut LayoutMirror, parent: NodeId) -> Vec<SourceChange> {
    let parent = if mirror.contains(parent) { parent } else { mirror.root() };
    let layout = match proxy.get_layout(parent.0, -1, &[]).await {
        Ok((_, raw)) => LayoutNode::from_raw(raw),
        Err(err) => Err(Error::from(err)),
    };
    match layout {
        Ok(layout) => mirror.apply_layout(layout),
        Err(err) => {
            debug!("Failed to refresh layout of {parent}: {err}");
            Vec::new()
        },
    }
}

async fn serve<L, P>(
    proxy: DbusMenuProxy<'static>,
    mut mirror: LayoutMirror,
    mut channels: ClientChannels,
    layouts: L,
    properties: P,
) where
    L: Stream<Item = LayoutUpdated> + Send + 'static,
    P: Stream<Item = ItemsPropertiesUpdated> + Send + 'static,
{
    let mut layouts = Box::pin(layouts);
    let mut properties = Box::pin(properties);
    let name = proxy.inner().path().to_string();

    loop {
        tokio::select! {
            request = channels.next_request() => match request {
                Some(ClientRequest::AboutToShow(id)) => match proxy.about_to_show(id.0).await {
                    Ok(true) => {
                        let changes = refresh(&proxy, &mut mirror, id).await;
                        channels.send_all(changes);
                    },
                    Ok(false) => {},
                    Err(err) => debug!("AboutToShow({id}) failed: {err}"),
                },
                Some(ClientRequest::Event(id, event)) => {
                    let data = Value::from(0i32);
                    if let Err(err) = proxy.event(id.0, event.as_str(), &data, timestamp()).await {
                        debug!("Event({id}, {event}) failed: {err}");
                    }
                },
                None => break,
            },
            Some(signal) = layouts.next() => match signal.args().map(|args| NodeId(*args.parent())) {
                Ok(parent) => {
                    let changes = refresh(&proxy, &mut mirror, parent).await;
                    channels.send_all(changes);
                },
                Err(err) => debug!("Malformed LayoutUpdated: {err}"),
            },
            Some(signal) = properties.next() => match signal.args() {
                Ok(args) => {
                    let changes = mirror.apply_properties(args.updated_props(), args.removed_props());
                    channels.send_all(changes);
                },
                Err(err) => debug!("Malformed ItemsPropertiesUpdated: {err}"),
            },
            else => break,
        }
    }
    debug!("Stopped mirroring {name}");
}
