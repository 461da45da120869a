//! The hash-table partition type (spec.md §4.3).

mod commands;
mod hash;
mod metadata;
mod partition;

pub use commands::{
    build_command_table, EXISTS, GET, GET_DATA_IN_SLOT_RANGE, GET_METADATA, GET_STORAGE_SIZE,
    PUT, REMOVE, SCALE_PUT, SCALE_REMOVE, UPDATE, UPDATE_PARTITION, UPSERT,
};
pub use hash::hash_slot;
pub use metadata::{HashPartitionMetadata, MetadataParseError, PartitionState, ScaleDirection};
pub use partition::{HashTableConfig, HashTablePartition};
