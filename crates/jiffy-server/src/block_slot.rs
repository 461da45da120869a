//! Block-slot table (spec.md §2 "fixed pool of block slots").
//!
//! A storage-server process hosts a fixed-size pool of slots; each may be
//! bound to a partition of any registered type over its lifetime. Grounded
//! on `partition_manager.h`'s block-table shape and the kernel/runtime
//! split the teacher uses in `kimberlite-kernel` for "state behind a slot
//! index, rebuilt in place by a management call".

use std::sync::Arc;

use jiffy_chain::{ChainEngine, ChainRole};
use jiffy_kernel::{PartitionRegistry, RegistryError};
use jiffy_types::BlockId;
use parking_lot::RwLock;

use crate::error::{FatalError, ServerError};

struct BlockSlot {
    partition_type: String,
    partition_name: String,
    engine: Arc<ChainEngine>,
}

/// The fixed pool of block slots a storage-server process hosts. Slot
/// `i` is addressed by `BlockId::new(i)`; `setup_block` replaces whatever
/// a slot holds, `reset` empties it.
pub struct BlockSlotTable {
    slots: Vec<RwLock<Option<BlockSlot>>>,
    registry: PartitionRegistry,
}

impl BlockSlotTable {
    pub fn new(slot_count: u32, registry: PartitionRegistry) -> Self {
        Self {
            slots: (0..slot_count).map(|_| RwLock::new(None)).collect(),
            registry,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn index(&self, block: BlockId) -> Result<usize, ServerError> {
        let idx = usize::try_from(block.as_i32()).map_err(|_| FatalError::BlockIdOutOfRange(block))?;
        if idx >= self.slots.len() {
            return Err(FatalError::BlockIdOutOfRange(block).into());
        }
        Ok(idx)
    }

    /// Builds a fresh partition of `partition_type` and installs it in
    /// `block`'s slot with the given chain wiring (spec.md §6 "Management
    /// RPC — setup_block"). Replaces anything already occupying the slot.
    pub fn setup_block(
        &self,
        block: BlockId,
        partition_type: &str,
        partition_name: &str,
        partition_metadata: &str,
        chain: Vec<String>,
        role: ChainRole,
    ) -> Result<Arc<ChainEngine>, ServerError> {
        let idx = self.index(block)?;
        let partition = self
            .registry
            .build(partition_type, partition_name, partition_metadata)
            .map_err(|e| match e {
                RegistryError::UnknownType(t) => {
                    ServerError::Fatal(FatalError::PartitionTypeNotRegistered(t))
                }
                other => ServerError::Registry(other),
            })?;
        let engine = Arc::new(ChainEngine::new(partition));
        engine.set_role(role);
        engine.set_chain(chain);
        *self.slots[idx].write() = Some(BlockSlot {
            partition_type: partition_type.to_string(),
            partition_name: partition_name.to_string(),
            engine: engine.clone(),
        });
        Ok(engine)
    }

    pub fn get(&self, block: BlockId) -> Result<Arc<ChainEngine>, ServerError> {
        let idx = self.index(block)?;
        self.slots[idx]
            .read()
            .as_ref()
            .map(|s| s.engine.clone())
            .ok_or(ServerError::SlotEmpty(block))
    }

    /// Returns `(partition_type, partition_name)` for a populated slot,
    /// used by the management surface's `path` RPC.
    pub fn describe(&self, block: BlockId) -> Result<(String, String), ServerError> {
        let idx = self.index(block)?;
        self.slots[idx]
            .read()
            .as_ref()
            .map(|s| (s.partition_type.clone(), s.partition_name.clone()))
            .ok_or(ServerError::SlotEmpty(block))
    }

    /// Empties a slot (spec.md §6 "Management RPC — reset").
    pub fn reset(&self, block: BlockId) -> Result<(), ServerError> {
        let idx = self.index(block)?;
        *self.slots[idx].write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiffy_kernel::HashTableBuilder;

    fn table() -> BlockSlotTable {
        let mut registry = PartitionRegistry::new();
        registry.register("hashtable", Box::new(HashTableBuilder::default()));
        BlockSlotTable::new(4, registry)
    }

    #[test]
    fn setup_block_installs_engine_in_the_named_slot() {
        let table = table();
        table
            .setup_block(BlockId::new(0), "hashtable", "0_65536", "regular", vec![], ChainRole::Singleton)
            .unwrap();
        let engine = table.get(BlockId::new(0)).unwrap();
        assert!(engine.is_head());
        assert!(engine.is_tail());
    }

    #[test]
    fn get_on_empty_slot_errors() {
        let table = table();
        assert!(matches!(table.get(BlockId::new(1)), Err(ServerError::SlotEmpty(_))));
    }

    #[test]
    fn out_of_range_block_id_is_fatal() {
        let table = table();
        assert!(matches!(
            table.get(BlockId::new(99)),
            Err(ServerError::Fatal(FatalError::BlockIdOutOfRange(_)))
        ));
    }

    #[test]
    fn unregistered_partition_type_is_fatal() {
        let table = table();
        let err = table.setup_block(BlockId::new(0), "queue", "x", "regular", vec![], ChainRole::Singleton);
        assert!(matches!(err, Err(ServerError::Fatal(FatalError::PartitionTypeNotRegistered(_)))));
    }

    #[test]
    fn reset_empties_a_populated_slot() {
        let table = table();
        table
            .setup_block(BlockId::new(0), "hashtable", "0_65536", "regular", vec![], ChainRole::Singleton)
            .unwrap();
        table.reset(BlockId::new(0)).unwrap();
        assert!(matches!(table.get(BlockId::new(0)), Err(ServerError::SlotEmpty(_))));
    }
}
