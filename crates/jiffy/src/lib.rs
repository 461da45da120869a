//! # jiffy
//!
//! Elastic distributed in-memory storage-block chain engine. Re-exports
//! the public surface of the internal crates (spec.md §2 "System
//! overview") so a downstream binary or test harness depends on one
//! crate rather than the six it's built from; the `jiffyd` binary in
//! this crate is the reference storage-server process.
//!
//! ```text
//! jiffy-types -> jiffy-kernel -> jiffy-chain -> jiffy-server
//!                                jiffy-directory ----^
//!                                jiffy-config --------^
//! ```

pub use jiffy_chain::{
    ChainEngine, ChainError, ChainOp, ChainRequestOutcome, ChainRole, ClientResponseSink, LinkError,
    NextLink, NoLink, NoResponseSink, PrevLink, RequestOutcome, ScaleCoordinator, ScaleError,
    ScaleTrigger,
};
pub use jiffy_config::{ConfigError, JiffyConfig, Paths};
pub use jiffy_directory::{
    DataStatus, DirectoryClient, DirectoryError, FakeDirectory, NotificationSink, NullSink,
    SubscriberId, SubscriptionMap,
};
pub use jiffy_kernel::{
    CommandDescriptor, CommandFlags, CommandOutcome, CommandTable, HashTableBuilder, KernelError,
    Partition, PartitionBuilder, PartitionEvent, PartitionRegistry, RegistryError,
};
pub use jiffy_server::{
    BlockSlotTable, ClientRegistry, Handler, ServerError, StorageServer, TcpDestinationClient,
    TcpNextLink, TcpPrevLink,
};
pub use jiffy_types::{
    arg, ArgList, BlockId, BlockName, BlockNameError, ClientId, CommandId, SequenceId, SlotRange,
};

/// Builds a [`jiffy_kernel::PartitionRegistry`] with every partition kind
/// this build knows how to construct. Only `hashtable` exists today
/// (spec.md §4.1); new partition kinds register here.
pub fn default_partition_registry() -> PartitionRegistry {
    let mut registry = PartitionRegistry::new();
    registry.register("hashtable", Box::new(HashTableBuilder::default()));
    registry
}
