//! The [RemoteMenuSource] handed to the core.
//!
//! A [RemoteClient] is only a pair of channel ends. The protocol task on the bridge thread
//! owns the other ends and stops once the client is dropped.

use std::sync::mpsc::{self, Receiver, Sender};

use appmenu_core::model::NodeId;
use appmenu_core::source::{ItemEvent, RemoteMenuSource, SourceChange};
use log::debug;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Requests travelling from a [RemoteClient] to its protocol task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    /// Forward `AboutToShow`.
    AboutToShow(NodeId),
    /// Forward an item event.
    Event(NodeId, ItemEvent),
}

/// A live remote menu backed by a task on the bridge thread.
#[derive(Debug)]
pub struct RemoteClient {
    root: NodeId,
    name: String,
    changes: Receiver<SourceChange>,
    requests: UnboundedSender<ClientRequest>,
}

/// The protocol task's side of a [RemoteClient].
#[derive(Debug)]
pub struct ClientChannels {
    changes: Sender<SourceChange>,
    requests: UnboundedReceiver<ClientRequest>,
}

/// Create a client and the channels feeding it.
pub fn channel(root: NodeId, name: impl Into<String>) -> (RemoteClient, ClientChannels) {
    let (changes_tx, changes_rx) = mpsc::channel();
    let (requests_tx, requests_rx) = unbounded_channel();
    (
        RemoteClient {
            root,
            name: name.into(),
            changes: changes_rx,
            requests: requests_tx,
        },
        ClientChannels {
            changes: changes_tx,
            requests: requests_rx,
        },
    )
}

impl ClientChannels {
    /// Queue changes for the client. Returns false once the client is gone.
    pub fn send_all(&self, changes: Vec<SourceChange>) -> bool {
        changes.into_iter().all(|change| self.changes.send(change).is_ok())
    }

    /// Wait for the next request. `None` once the client is gone.
    pub async fn next_request(&mut self) -> Option<ClientRequest> {
        self.requests.recv().await
    }
}

impl RemoteClient {
    fn request(&self, request: ClientRequest) {
        if self.requests.send(request).is_err() {
            debug!("Menu task of {} is gone, dropping {request:?}", self.name);
        }
    }
}

impl RemoteMenuSource for RemoteClient {
    fn root_id(&self) -> NodeId {
        self.root
    }

    fn poll_changes(&mut self) -> Vec<SourceChange> {
        self.changes.try_iter().collect()
    }

    fn send_about_to_show(&self, id: NodeId) {
        self.request(ClientRequest::AboutToShow(id));
    }

    fn send_event(&self, id: NodeId, event: ItemEvent) {
        self.request(ClientRequest::Event(id, event));
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appmenu_core::model::{ItemProperties, MenuKind};
    use appmenu_core::source::RemoteNode;

    #[test]
    fn test_changes_arrive_in_order() {
        let (mut client, channels) = channel(NodeId(0), ":1.4/menu");
        let first = SourceChange::ChildAdded {
            parent: NodeId(0),
            position: 0,
            node: RemoteNode::new(NodeId(1), ItemProperties::new(MenuKind::Item)),
        };
        let second = SourceChange::Destroyed { id: NodeId(1) };
        assert!(channels.send_all(vec![first.clone(), second.clone()]));

        assert_eq!(client.poll_changes(), vec![first, second]);
        assert!(client.poll_changes().is_empty());
        assert_eq!(client.describe(), ":1.4/menu");
    }

    #[tokio::test]
    async fn test_dropping_the_client_ends_the_task_side() {
        let (client, mut channels) = channel(NodeId(0), "test");
        client.send_event(NodeId(3), ItemEvent::Clicked);
        client.send_about_to_show(NodeId(3));
        drop(client);

        assert_eq!(
            channels.next_request().await,
            Some(ClientRequest::Event(NodeId(3), ItemEvent::Clicked))
        );
        assert_eq!(channels.next_request().await, Some(ClientRequest::AboutToShow(NodeId(3))));
        assert_eq!(channels.next_request().await, None);
        assert!(!channels.send_all(vec![SourceChange::Destroyed { id: NodeId(0) }]));
    }
}
