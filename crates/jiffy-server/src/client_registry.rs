//! Client registry: routes a tail's asynchronous response back to the
//! command-surface connection that's waiting on it (spec.md §6
//! "Responses stream back on a server-initiated callback channel bound
//! to `client_id`").

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use jiffy_chain::ClientResponseSink;
use jiffy_types::{ArgList, ClientId};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// One entry per currently-connected client: the channel its
/// command-surface connection reads pushed responses from.
#[derive(Default)]
pub struct ClientRegistry {
    next_id: AtomicI64,
    senders: Mutex<HashMap<ClientId, mpsc::UnboundedSender<ArgList>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh `ClientId` and its push channel (spec.md §6
    /// "get_client_id").
    pub fn register(&self) -> (ClientId, mpsc::UnboundedReceiver<ArgList>) {
        let id = ClientId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().insert(id, tx);
        (id, rx)
    }

    pub fn unregister(&self, client: ClientId) {
        self.senders.lock().remove(&client);
    }
}

impl ClientResponseSink for ClientRegistry {
    fn respond(&self, client: ClientId, response: ArgList) {
        if let Some(tx) = self.senders.lock().get(&client) {
            let _ = tx.send(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn registered_client_receives_pushed_response() {
        let registry = ClientRegistry::new();
        let (id, mut rx) = registry.register();
        registry.respond(id, vec![Bytes::from_static(b"!ok")]);
        let received = rx.recv().await.unwrap();
        assert_eq!(&received[0][..], b"!ok");
    }

    #[test]
    fn unregistered_client_is_silently_dropped() {
        let registry = ClientRegistry::new();
        registry.respond(ClientId::new(42), vec![Bytes::from_static(b"!ok")]);
    }

    #[test]
    fn unregister_stops_further_delivery() {
        let registry = ClientRegistry::new();
        let (id, mut rx) = registry.register();
        registry.unregister(id);
        registry.respond(id, vec![Bytes::from_static(b"!ok")]);
        assert!(rx.try_recv().is_err());
    }
}
