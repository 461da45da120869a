//! Delivery of responses back to the client that issued a chain-replicated
//! mutation.
//!
//! A response only becomes available once the op has been applied at the
//! tail, which may be several hops downstream of the head the client is
//! actually talking to (spec.md §4.6 "client-response map"). Rather than
//! carry the response back up the chain alongside `chain_ack`, the tail
//! delivers it directly through whatever reverse channel the client
//! registered when it called `register_client_id` — this trait is that
//! channel, decoupling the replication engine from the RPC transport that
//! implements it (owned by `jiffy-server`).

use jiffy_types::{ArgList, ClientId};

pub trait ClientResponseSink: Send + Sync {
    fn respond(&self, client: ClientId, response: ArgList);
}

/// No reverse channel configured — the default until the server binds one
/// for a given block slot. Responses are silently dropped, matching how a
/// block with no registered clients behaves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResponseSink;

impl ClientResponseSink for NoResponseSink {
    fn respond(&self, _client: ClientId, _response: ArgList) {}
}
