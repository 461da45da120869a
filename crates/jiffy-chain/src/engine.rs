//! The chain engine (spec.md §4.2).
//!
//! Wraps a [`Partition`] and adds replication: stamping sequence numbers
//! at the head, forwarding mutations down the chain, acknowledging
//! upstream on commit at the tail, and replaying the pending map after a
//! directory-driven reconfiguration. Grounded on the original
//! `chain_module` (`original_source/libjiffy/src/jiffy/storage/chain_module.h`):
//! same `request`/`chain_request`/`ack`/`resend_pending`/`forward_all`
//! vocabulary, same pending-map-keyed-by-`server_seq` shape, reworked as
//! Rust trait objects instead of Thrift client handles.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use jiffy_kernel::{KernelError, Partition, PartitionEvent};
use jiffy_types::{ArgList, ClientId, CommandId, SequenceId};
use parking_lot::{Mutex, RwLock};
use tracing::instrument;

use crate::client::{ClientResponseSink, NoResponseSink};
use crate::link::{LinkError, NextLink, NoLink, PrevLink};
use crate::op::{ChainOp, ChainRole};

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("request() called on a non-head replica")]
    NotHead,

    #[error("chain link error: {0}")]
    Link(#[from] LinkError),

    #[error("partition error: {0}")]
    Kernel(#[from] KernelError),
}

/// What `request()` produced (spec.md §4.2 "Request ingress").
#[derive(Debug, Clone, Default)]
pub struct RequestOutcome {
    /// `Some` only when this replica answered immediately (the singleton
    /// case); `None` when the answer will arrive later via the bound
    /// `ClientResponseSink`.
    pub response: Option<ArgList>,
    /// Notification events from the local apply — only non-empty
    /// alongside `response: Some(..)`, for the same reason.
    pub events: Vec<PartitionEvent>,
}

/// What happened when an op landed via `chain_request`.
#[derive(Debug, Clone, Default)]
pub struct ChainRequestOutcome {
    /// Notification events produced by the local apply, forwarded to a
    /// `jiffy_directory::NotificationSink` by the caller — `jiffy-chain`
    /// has no dependency on that crate, so it only hands the data back.
    pub events: Vec<PartitionEvent>,
    /// `true` if this apply was skipped because `seq.server_seq` was
    /// already applied (replay idempotency, spec.md §5 "Failure recovery").
    pub already_applied: bool,
}

/// Wraps a [`Partition`] with chain replication.
pub struct ChainEngine {
    partition: Arc<dyn Partition>,
    role: RwLock<ChainRole>,
    chain: RwLock<Vec<String>>,
    chain_seq_no: AtomicI64,
    last_applied_seq: AtomicI64,
    next: RwLock<Box<dyn NextLink>>,
    prev: RwLock<Box<dyn PrevLink>>,
    response_sink: RwLock<Box<dyn ClientResponseSink>>,
    /// Doubles as spec.md's `request_mtx` (serializing stamp+insert+forward
    /// at the head) and the pending map's own lock — a `BTreeMap` keyed by
    /// `server_seq` gives `resend_pending` ascending order for free.
    pending: Mutex<BTreeMap<i64, ChainOp>>,
}

impl ChainEngine {
    pub fn new(partition: Arc<dyn Partition>) -> Self {
        Self {
            partition,
            role: RwLock::new(ChainRole::Singleton),
            chain: RwLock::new(Vec::new()),
            chain_seq_no: AtomicI64::new(0),
            last_applied_seq: AtomicI64::new(-1),
            next: RwLock::new(Box::new(NoLink)),
            prev: RwLock::new(Box::new(NoLink)),
            response_sink: RwLock::new(Box::new(NoResponseSink)),
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn partition(&self) -> &Arc<dyn Partition> {
        &self.partition
    }

    pub fn role(&self) -> ChainRole {
        *self.role.read()
    }

    pub fn set_role(&self, role: ChainRole) {
        *self.role.write() = role;
    }

    pub fn chain(&self) -> Vec<String> {
        self.chain.read().clone()
    }

    pub fn set_chain(&self, chain: Vec<String>) {
        *self.chain.write() = chain;
    }

    pub fn is_head(&self) -> bool {
        self.role().is_head()
    }

    pub fn is_tail(&self) -> bool {
        self.role().is_tail()
    }

    pub fn reset_next(&self, link: Box<dyn NextLink>) {
        *self.next.write() = link;
    }

    pub fn reset_prev(&self, link: Box<dyn PrevLink>) {
        *self.prev.write() = link;
    }

    pub fn reset_response_sink(&self, sink: Box<dyn ClientResponseSink>) {
        *self.response_sink.write() = sink;
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn last_applied_seq(&self) -> i64 {
        self.last_applied_seq.load(Ordering::Acquire)
    }

    /// Proxies a read straight to the tail without going through the
    /// stamped pending pipeline — used both for accessor forwarding on a
    /// singleton-less head and for `forward_all`'s batched catch-up
    /// (spec.md §4.2 "Forward-all").
    #[instrument(skip(self, args))]
    pub fn run_command(&self, cmd: CommandId, args: &ArgList) -> Result<ArgList, ChainError> {
        if self.is_tail() {
            Ok(self.partition.dispatch(cmd, args)?.response)
        } else {
            Ok(self.next.read().run_command(cmd, args)?)
        }
    }

    /// Entry point for a brand-new client request (spec.md §4.2 "Request
    /// ingress"). Only valid on a head or singleton. `response` is
    /// populated immediately only when this replica is also the tail (the
    /// singleton case), with `events` from that same local apply;
    /// otherwise the eventual response is delivered asynchronously through
    /// the bound [`ClientResponseSink`] once the tail applies it, and
    /// `events` is empty (the caller sees them later via `chain_request`'s
    /// own `ChainRequestOutcome` at whichever replica actually commits).
    #[instrument(skip(self, args))]
    pub fn request(
        &self,
        client: ClientId,
        client_seq: i64,
        cmd: CommandId,
        args: ArgList,
    ) -> Result<RequestOutcome, ChainError> {
        if !self.is_head() {
            return Err(ChainError::NotHead);
        }
        if self.is_tail() {
            // Singleton: stamp, apply, and reply without a network hop.
            let server_seq = self.chain_seq_no.fetch_add(1, Ordering::AcqRel) + 1;
            let _seq = SequenceId::from_client(client_seq).stamped(server_seq);
            let outcome = self.partition.dispatch(cmd, &args)?;
            self.last_applied_seq.store(server_seq, Ordering::Release);
            return Ok(RequestOutcome {
                response: Some(outcome.response),
                events: outcome.events,
            });
        }

        // Non-singleton head: mutations travel the stamped pipeline; an
        // accessor reaching this point (non-tail, non-singleton) takes the
        // same path so the tail answers it in order (spec.md §4.2
        // "Accessor ... on non-tail heads, forward the same as a
        // mutation").
        let mut pending = self.pending.lock();
        let server_seq = self.chain_seq_no.fetch_add(1, Ordering::AcqRel) + 1;
        let seq = SequenceId::from_client(client_seq).stamped(server_seq);
        let op = ChainOp::new(seq, client, cmd, args.clone());
        pending.insert(server_seq, op);
        drop(pending);

        self.next.read().chain_request(seq, client, cmd, &args)?;
        // The apply-and-ack chain completes downstream; the tail delivers
        // the response via `response_sink` keyed by `client`. We do not
        // wait for it here.
        Ok(RequestOutcome::default())
    }

    /// Applies a forwarded op locally and either propagates it further
    /// down the chain (head/mid) or, at the tail, acknowledges upstream
    /// and delivers the response to the client (spec.md §4.2
    /// "Chain-forward").
    #[instrument(skip(self, args))]
    pub fn chain_request(
        &self,
        seq: SequenceId,
        client: ClientId,
        cmd: CommandId,
        args: ArgList,
    ) -> Result<ChainRequestOutcome, ChainError> {
        if seq.server_seq <= self.last_applied_seq() {
            return Ok(ChainRequestOutcome {
                events: Vec::new(),
                already_applied: true,
            });
        }

        let outcome = self.partition.dispatch(cmd, &args)?;
        self.last_applied_seq.store(seq.server_seq, Ordering::Release);

        if self.is_tail() {
            self.response_sink.read().respond(client, outcome.response.clone());
            if self.prev.read().is_connected() {
                self.prev.read().ack(seq)?;
            }
        } else {
            let mut pending = self.pending.lock();
            pending.insert(seq.server_seq, ChainOp::new(seq, client, cmd, args.clone()));
            drop(pending);
            self.next.read().chain_request(seq, client, cmd, &args)?;
        }

        Ok(ChainRequestOutcome {
            events: outcome.events,
            already_applied: false,
        })
    }

    /// Handles a `chain_ack` from the next replica: drops the pending
    /// entry and, unless this replica originated the request (the head
    /// has no previous link), propagates the ack further upstream
    /// (spec.md §4.2 "Acknowledgement").
    #[instrument(skip(self))]
    pub fn ack(&self, seq: SequenceId) -> Result<(), ChainError> {
        self.pending.lock().remove(&seq.server_seq);
        let prev = self.prev.read();
        if prev.is_connected() {
            prev.ack(seq)?;
        }
        Ok(())
    }

    /// Re-issues every pending op to the current next link in ascending
    /// `server_seq` order, used after the directory rewires this
    /// replica's successor (spec.md §5 "Failure recovery").
    #[instrument(skip(self))]
    pub fn resend_pending(&self) -> Result<(), ChainError> {
        let snapshot: Vec<ChainOp> = self.pending.lock().values().cloned().collect();
        let next = self.next.read();
        for op in snapshot {
            next.chain_request(op.seq, op.client, op.cmd, &op.args)?;
        }
        Ok(())
    }

    /// Streams the partition's full live state to the next replica,
    /// bypassing the pending/ack mechanism entirely (spec.md §4.2
    /// "Forward-all").
    #[instrument(skip(self))]
    pub fn forward_all(&self) -> Result<(), ChainError> {
        if self.is_tail() {
            return Ok(());
        }
        for (cmd, args) in self.partition.forward_all_ops() {
            self.next.read().run_command(cmd, &args)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiffy_kernel::{HashTableConfig, HashTablePartition, PUT};
    use std::sync::Mutex as StdMutex;

    struct FakeNext(Arc<ChainEngine>);

    impl NextLink for FakeNext {
        fn chain_request(
            &self,
            seq: SequenceId,
            client: ClientId,
            cmd: CommandId,
            args: &ArgList,
        ) -> Result<(), LinkError> {
            self.0
                .chain_request(seq, client, cmd, args.clone())
                .map(|_| ())
                .map_err(|e| LinkError::Unreachable(e.to_string()))
        }

        fn run_command(&self, cmd: CommandId, args: &ArgList) -> Result<ArgList, LinkError> {
            self.0
                .run_command(cmd, args)
                .map_err(|e| LinkError::Unreachable(e.to_string()))
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    struct FakePrev(Arc<ChainEngine>);

    impl PrevLink for FakePrev {
        fn ack(&self, seq: SequenceId) -> Result<(), LinkError> {
            self.0
                .ack(seq)
                .map_err(|e| LinkError::Unreachable(e.to_string()))
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingSink(StdMutex<Vec<(ClientId, ArgList)>>);

    impl ClientResponseSink for RecordingSink {
        fn respond(&self, client: ClientId, response: ArgList) {
            self.0.lock().unwrap().push((client, response));
        }
    }

    fn hash_partition() -> Arc<dyn Partition> {
        Arc::new(HashTablePartition::new("0_65536", "regular", HashTableConfig::default()).unwrap())
    }

    fn b(s: &str) -> bytes::Bytes {
        bytes::Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn singleton_applies_and_replies_without_network_hop() {
        let engine = ChainEngine::new(hash_partition());
        let outcome = engine
            .request(ClientId::new(1), 1, PUT, vec![b("k"), b("v")])
            .unwrap();
        assert_eq!(&outcome.response.unwrap()[0][..], b"!ok");
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(engine.pending_len(), 0);
    }

    #[test]
    fn three_node_chain_replicates_and_acks_upstream() {
        let head = Arc::new(ChainEngine::new(hash_partition()));
        let mid = Arc::new(ChainEngine::new(hash_partition()));
        let tail = Arc::new(ChainEngine::new(hash_partition()));

        head.set_role(ChainRole::Head);
        mid.set_role(ChainRole::Mid);
        tail.set_role(ChainRole::Tail);

        head.reset_next(Box::new(FakeNext(mid.clone())));
        mid.reset_prev(Box::new(FakePrev(head.clone())));
        mid.reset_next(Box::new(FakeNext(tail.clone())));
        tail.reset_prev(Box::new(FakePrev(mid.clone())));

        let sink = Arc::new(RecordingSink::default());
        tail.reset_response_sink(Box::new(SinkHandle(sink.clone())));

        let outcome = head
            .request(ClientId::new(7), 1, PUT, vec![b("k"), b("v")])
            .unwrap();
        assert!(outcome.response.is_none(), "multi-node head replies asynchronously");

        let delivered = sink.0.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, ClientId::new(7));
        assert_eq!(&delivered[0].1[0][..], b"!ok");
        drop(delivered);

        assert_eq!(head.pending_len(), 0, "ack should drain head's pending entry");
        assert_eq!(mid.pending_len(), 0, "ack should drain mid's pending entry");
        assert_eq!(tail.pending_len(), 0, "tail never holds pending entries");
    }

    struct SinkHandle(Arc<RecordingSink>);

    impl ClientResponseSink for SinkHandle {
        fn respond(&self, client: ClientId, response: ArgList) {
            self.0.respond(client, response);
        }
    }
}
