//! Background thread owning the session bus connection.
//!
//! The core is single threaded and never awaits. [Bridge] runs a current-thread tokio runtime
//! on its own thread, takes [Command]s over an unbounded channel and hands completed work back
//! through std channels that the owner drains from its event loop.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use appmenu_core::error::{ProbeError, ResolveError};
use appmenu_core::registry::WindowId;
use appmenu_core::resolver::{MenuLocator, ResolveRequest, Ticket};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use zbus::Connection;

use crate::client::RemoteClient;
use crate::registrar::{Registrar, RegistrarEvent, REGISTRAR_BUS, REGISTRAR_PATH};
use crate::{dbusmenu, gtk, probe, Error, Result};

/// How the bridge sets up its connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Export `com.canonical.AppMenu.Registrar` and try to own its name.
    pub serve_registrar: bool,
}

/// Commands sent to the bridge thread.
#[derive(Debug)]
pub(crate) enum Command {
    Resolve(ResolveRequest),
    Probe(WindowId, Ticket),
    Cancel(WindowId),
    EmitUnregistered(WindowId),
    Shutdown,
}

/// Work completed on the bridge thread.
#[derive(Debug)]
pub enum Reply {
    /// Outcome of a resolve request.
    Resolved(WindowId, Ticket, std::result::Result<RemoteClient, ResolveError>),
    /// Outcome of a window property probe.
    Probed(WindowId, Ticket, std::result::Result<MenuLocator, ProbeError>),
}

/// Handle to the bus thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct Bridge {
    commands: UnboundedSender<Command>,
    replies: Receiver<Reply>,
    registrar: Receiver<RegistrarEvent>,
}

impl Bridge {
    /// Connect to the session bus on a new thread.
    ///
    /// Blocks until the connection is established, so connection failures surface here.
    pub fn start(options: BridgeOptions) -> Result<Self> {
        let (commands, command_rx) = unbounded_channel();
        let (reply_tx, replies) = mpsc::channel();
        let (event_tx, registrar) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        thread::Builder::new()
            .name("appmenu-dbus".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        let _ = ready_tx.send(Err(Error::Io(err)));
                        return;
                    },
                };
                runtime.block_on(async move {
                    match connect(options, event_tx).await {
                        Ok(connection) => {
                            let _ = ready_tx.send(Ok(()));
                            run(connection, command_rx, reply_tx).await;
                        },
                        Err(err) => {
                            error!("Failed to connect to the session bus: {err}");
                            let _ = ready_tx.send(Err(err));
                        },
                    }
                });
            })?;

        ready_rx.recv().map_err(|_| Error::Disconnected)??;
        Ok(Self {
            commands,
            replies,
            registrar,
        })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::Disconnected)
    }

    /// Start building a client for `request`.
    pub fn resolve(&self, request: ResolveRequest) -> Result<()> {
        self.send(Command::Resolve(request))
    }

    /// Start probing the window properties of `window`.
    pub fn probe(&self, window: WindowId, ticket: Ticket) -> Result<()> {
        self.send(Command::Probe(window, ticket))
    }

    /// Abort outstanding work for `window`.
    pub fn cancel(&self, window: WindowId) -> Result<()> {
        self.send(Command::Cancel(window))
    }

    /// Drop `window` from the registrar table and emit `WindowUnregistered`.
    pub fn emit_unregistered(&self, window: WindowId) -> Result<()> {
        self.send(Command::EmitUnregistered(window))
    }

    /// Take every reply since the last call.
    pub fn take_replies(&self) -> Vec<Reply> {
        self.replies.try_iter().collect()
    }

    /// Take every registrar announcement since the last call.
    pub fn take_registrar_events(&self) -> Vec<RegistrarEvent> {
        self.registrar.try_iter().collect()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

async fn connect(options: BridgeOptions, events: Sender<RegistrarEvent>) -> Result<Connection> {
    let connection = Connection::session().await?;
    if options.serve_registrar {
        connection
            .object_server()
            .at(REGISTRAR_PATH, Registrar::new(events))
            .await?;
        // Another registrar may already own the name; windows can still be probed.
        match connection.request_name(REGISTRAR_BUS).await {
            Ok(()) => info!("Serving {REGISTRAR_BUS} at {REGISTRAR_PATH}"),
            Err(err) => warn!("Could not acquire {REGISTRAR_BUS}: {err}"),
        }
    }
    Ok(connection)
}

async fn resolve(connection: &Connection, locator: &MenuLocator) -> Result<RemoteClient> {
    if locator.is_gtk {
        return gtk::connect(connection, locator).await;
    }
    match (locator.sender.as_deref(), locator.menubar_path.as_deref()) {
        (Some(sender), Some(path)) => dbusmenu::connect(connection, sender, path).await,
        _ => Err(Error::Layout("locator lacks a sender or menubar path")),
    }
}

async fn emit_unregistered(connection: &Connection, window: WindowId) {
    let iface = match connection
        .object_server()
        .interface::<_, Registrar>(REGISTRAR_PATH)
        .await
    {
        Ok(iface) => iface,
        // Not serving the registrar.
        Err(_) => return,
    };
    iface.get_mut().await.forget(window);
    if let Err(err) = Registrar::window_unregistered(iface.signal_emitter(), window.0).await {
        warn!("Failed to emit WindowUnregistered for {window}: {err}");
    }
}

async fn run(connection: Connection, mut commands: UnboundedReceiver<Command>, replies: Sender<Reply>) {
    let mut tasks: HashMap<WindowId, Vec<JoinHandle<()>>> = HashMap::new();

    while let Some(command) = commands.recv().await {
        tasks.retain(|_, handles| {
            handles.retain(|handle| !handle.is_finished());
            !handles.is_empty()
        });

        match command {
            Command::Resolve(ResolveRequest { window, ticket, locator }) => {
                let connection = connection.clone();
                let replies = replies.clone();
                let handle = tokio::spawn(async move {
                    let result = resolve(&connection, &locator).await.map_err(|err| {
                        debug!("Failed to resolve menu of {window}: {err}");
                        ResolveError::from(err)
                    });
                    let _ = replies.send(Reply::Resolved(window, ticket, result));
                });
                tasks.entry(window).or_default().push(handle);
            },
            Command::Probe(window, ticket) => {
                let replies = replies.clone();
                let handle = tokio::spawn(async move {
                    let result = probe::probe_window(window).await;
                    let _ = replies.send(Reply::Probed(window, ticket, result));
                });
                tasks.entry(window).or_default().push(handle);
            },
            Command::Cancel(window) => {
                for handle in tasks.remove(&window).unwrap_or_default() {
                    handle.abort();
                }
            },
            Command::EmitUnregistered(window) => emit_unregistered(&connection, window).await,
            Command::Shutdown => break,
        }
    }

    for handle in tasks.into_values().flatten() {
        handle.abort();
    }
    debug!("D-Bus bridge stopped");
}
