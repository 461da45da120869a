//! Server error types (spec.md §7 "Error handling design").

use jiffy_chain::ChainError;
use jiffy_kernel::RegistryError;
use jiffy_types::BlockId;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

/// Protocol-level errors raised on the RPC surface (spec.md §7): the
/// request was well-formed transport-wise but invalid for this block's
/// current state.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown command")]
    UnknownCommand,

    #[error("malformed arguments: {0}")]
    MalformedArgs(String),

    #[error("command_request sent to a non-head replica")]
    NotHead,

    #[error("accessor reply expected from the tail, but this replica is not the tail")]
    NotTail,
}

/// Fatal, process-surviving errors (spec.md §7): the request that
/// triggered them fails, the server keeps running.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("partition type not registered: {0}")]
    PartitionTypeNotRegistered(String),

    #[error("block id out of range: {0}")]
    BlockIdOutOfRange(BlockId),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire encoding error: {0}")]
    Wire(#[from] bincode::Error),

    #[error("chain engine error: {0}")]
    Chain(#[from] ChainError),

    #[error("partition error: {0}")]
    Kernel(#[from] jiffy_kernel::KernelError),

    #[error("partition registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("fatal error: {0}")]
    Fatal(#[from] FatalError),

    #[error("block slot {0} is empty")]
    SlotEmpty(BlockId),

    #[error("connection closed")]
    ConnectionClosed,
}
