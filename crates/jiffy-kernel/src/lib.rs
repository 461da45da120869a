//! # jiffy-kernel: pure command interpreters for the storage-block chain engine
//!
//! A "partition" here is a command interpreter with no knowledge of chains,
//! roles, or networking (spec.md §4.1). This crate provides the `Partition`
//! trait, the hash-table partition that implements it, and a registry for
//! building partitions by type name. `jiffy-chain` wraps a `Partition` with
//! replication; this crate never imports it.

mod command;
mod events;
mod hash_table;
mod partition;
mod registry;

pub use command::{CommandDescriptor, CommandFlags, CommandOutcome, CommandTable};
pub use events::PartitionEvent;
pub use hash_table::{
    build_command_table as hash_table_command_table, hash_slot, HashPartitionMetadata,
    HashTableConfig, HashTablePartition, MetadataParseError, PartitionState, ScaleDirection,
    EXISTS, GET, GET_DATA_IN_SLOT_RANGE, GET_METADATA, GET_STORAGE_SIZE, PUT, REMOVE, SCALE_PUT,
    SCALE_REMOVE, UPDATE, UPDATE_PARTITION, UPSERT,
};
pub use partition::{KernelError, Partition};
pub use registry::{HashTableBuilder, PartitionBuilder, PartitionRegistry, RegistryError};
