//! The partition trait (spec.md §4.1 "Partition (the command interpreter)").
//!
//! A partition owns data and exposes a command table. It does not know
//! about chains, roles, or replication — the chain engine (`jiffy-chain`)
//! drives it. This split mirrors the teacher's kernel/runtime split: the
//! partition is the pure state + dispatch half, the chain engine is the
//! "runtime" half that adds ordering and I/O.

use std::path::Path;

use jiffy_types::{ArgList, CommandId};

use crate::command::{CommandOutcome, CommandTable};

/// Errors raised by the kernel layer. Command-level failures (key not
/// found, full, wrong state, …) are *not* represented here — spec.md §7
/// requires they travel as response sentinels, never as `Result::Err`.
/// Only protocol- and I/O-level failures use this type.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("unknown command: {0}")]
    UnknownCommand(CommandId),

    #[error("malformed arguments for command {cmd}: expected {expected}, got {got}")]
    MalformedArgs {
        cmd: CommandId,
        expected: &'static str,
        got: usize,
    },

    #[error("i/o error accessing persistent storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(String),
}

/// A command interpreter occupying a block slot (spec.md §4.1).
///
/// Implementations use interior mutability (the concurrent hash map in
/// [`crate::hash_table::HashTablePartition`] is the canonical example) so
/// that `dispatch` can take `&self` — the chain engine above serializes
/// mutation order via its own `request_mtx`/pending map, not by holding an
/// exclusive `&mut Partition`.
pub trait Partition: Send + Sync {
    /// This partition's command vocabulary.
    fn command_table(&self) -> &CommandTable;

    /// Applies a single command and returns its response plus any
    /// notification events. Never returns `Err` for command-level failures
    /// (those are sentinel responses) — only for protocol-level ones.
    fn dispatch(&self, cmd: CommandId, args: &ArgList) -> Result<CommandOutcome, KernelError>;

    /// Reads a persistent-storage blob into this partition, replacing its
    /// in-memory state. The engine does not interpret the blob format
    /// (spec.md §6 "Persistent backing") — the partition's own serializer
    /// does.
    fn load(&self, path: &Path) -> Result<(), KernelError>;

    /// Writes the mirror image of in-memory state to `path` if dirty.
    /// Returns `true` if a write occurred.
    fn sync(&self, path: &Path) -> Result<bool, KernelError>;

    /// Like `sync`, but also clears in-memory state afterward.
    fn dump(&self, path: &Path) -> Result<bool, KernelError>;

    /// Current size in bytes of the partition's live state.
    fn storage_size(&self) -> usize;

    /// Configured capacity in bytes.
    fn storage_capacity(&self) -> usize;

    /// `true` if state has changed since the last `sync`/`dump`.
    fn is_dirty(&self) -> bool;

    /// Streams the partition's full live state as a sequence of
    /// `(cmd_id, args)` pairs suitable for replaying on the next replica
    /// via chain forwarding, bypassing the single-ack pending mechanism
    /// (spec.md §4.2 "Forward-all"). For the hash-table partition this
    /// yields one `scale_put` per live key.
    fn forward_all_ops(&self) -> Vec<(CommandId, ArgList)>;
}
