//! Pluggable connections to chain neighbors.
//!
//! [`ChainEngine`](crate::engine::ChainEngine) is generic over these traits
//! so production code can plug in a real network client while tests plug
//! in an in-memory fake — the same split the teacher's kernel runtime uses
//! for `Clock`/`Storage`/`Network`.

use jiffy_types::{ArgList, ClientId, CommandId, SequenceId};

/// Errors raised while talking to a chain neighbor. Transport-specific
/// failures (a dropped TCP connection, a timeout) map into this type so
/// the engine never needs to know the transport.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("no connection configured")]
    NotConnected,

    #[error("chain neighbor unreachable: {0}")]
    Unreachable(String),
}

/// The downstream neighbor: the next replica in the chain, or the
/// external cluster the tail forwards `scale_put`/`scale_remove` to.
pub trait NextLink: Send + Sync {
    /// Forwards a stamped op to the next replica (spec.md §4.2
    /// `chain_request`). `client` travels alongside so whichever replica
    /// ends up applying this op as tail knows who to answer.
    fn chain_request(
        &self,
        seq: SequenceId,
        client: ClientId,
        cmd: CommandId,
        args: &ArgList,
    ) -> Result<(), LinkError>;

    /// Runs a command against the next replica and waits for its reply,
    /// used by the tail to proxy accessor commands that must answer from
    /// the tail's state (spec.md §4.1 "Command routing").
    fn run_command(&self, cmd: CommandId, args: &ArgList) -> Result<ArgList, LinkError>;

    /// `true` if a next-block connection is currently configured.
    fn is_connected(&self) -> bool;
}

/// The upstream neighbor: the previous replica, who is waiting on our
/// acknowledgement before it can drop its own pending entry.
pub trait PrevLink: Send + Sync {
    /// Acknowledges that `seq` has committed downstream of us (spec.md
    /// §4.2 `ack`).
    fn ack(&self, seq: SequenceId) -> Result<(), LinkError>;

    fn is_connected(&self) -> bool;
}

/// A [`NextLink`]/[`PrevLink`] pair with no neighbor configured — the
/// chain engine starts in this state before `reset_next`/`reset_prev` is
/// called, and singleton chains never leave it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLink;

impl NextLink for NoLink {
    fn chain_request(
        &self,
        _seq: SequenceId,
        _client: ClientId,
        _cmd: CommandId,
        _args: &ArgList,
    ) -> Result<(), LinkError> {
        Err(LinkError::NotConnected)
    }

    fn run_command(&self, _cmd: CommandId, _args: &ArgList) -> Result<ArgList, LinkError> {
        Err(LinkError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        false
    }
}

impl PrevLink for NoLink {
    fn ack(&self, _seq: SequenceId) -> Result<(), LinkError> {
        Err(LinkError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        false
    }
}
