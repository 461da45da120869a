//! Slot migration / auto-scaling driver (spec.md §4.4).
//!
//! Runs on the head of a hash-table partition's chain. Deciding *where*
//! to split or merge to is the directory's job (spec.md §1 "Out of
//! scope"); this module detects the trigger and drives the local/remote
//! `update_partition`/`scale_put`/`scale_remove` sequence once the
//! directory has picked a destination chain.

use bytes::Bytes;
use jiffy_kernel::{HashTablePartition, ScaleDirection, SCALE_REMOVE, UPDATE_PARTITION};
use jiffy_types::{ClientId, SlotRange};
use std::sync::Arc;

use crate::engine::{ChainEngine, ChainError};
use crate::link::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum ScaleError {
    #[error("a scale is already in flight for this partition")]
    AlreadyScaling,

    #[error("chain error during scale: {0}")]
    Chain(#[from] ChainError),

    #[error("destination chain unreachable: {0}")]
    Destination(#[from] LinkError),
}

/// What a poll of the partition's load recommends (spec.md §4.4 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleTrigger {
    None,
    Overload(SlotRange),
    Underload,
}

/// A client to the destination chain's head, used to push drained keys
/// across during an export and to drive the destination's own
/// `update_partition` transitions. Analogous to [`crate::link::NextLink`]
/// but addresses an arbitrary chain, not the immediate next replica.
pub trait DestinationClient: Send + Sync {
    fn scale_put(&self, key: &[u8], value: &[u8]) -> Result<(), LinkError>;
    fn update_partition(&self, new_name: &str, new_metadata: &str) -> Result<(), LinkError>;
}

/// Synthetic client identity scaling ops are attributed to when they
/// travel through [`ChainEngine::request`] — they have no real client
/// waiting on a response, so any fixed id works; `response_sink` simply
/// never hears about it because [`crate::client::NoResponseSink`] drops
/// deliveries for ids nobody bound.
const SCALE_CLIENT: ClientId = ClientId::new(-1);

/// Drives the overload-split / underload-merge protocol for one
/// hash-table partition's chain (spec.md §4.4). Must run on the chain's
/// head, since migration ops replicate through `ChainEngine::request`
/// like any other mutation.
pub struct ScaleCoordinator {
    engine: Arc<ChainEngine>,
    partition: Arc<HashTablePartition>,
}

impl ScaleCoordinator {
    pub fn new(engine: Arc<ChainEngine>, partition: Arc<HashTablePartition>) -> Self {
        Self { engine, partition }
    }

    /// Checks load thresholds and reports what the directory should do,
    /// if anything (spec.md §4.4 step 1).
    pub fn poll(&self) -> ScaleTrigger {
        if !self.partition.auto_scale_enabled() {
            return ScaleTrigger::None;
        }
        if self.partition.overload() {
            let range = self.partition.slot_range();
            ScaleTrigger::Overload(range)
        } else if self.partition.underload() {
            ScaleTrigger::Underload
        } else {
            ScaleTrigger::None
        }
    }

    /// Transitions this (source) partition into `exporting` for
    /// `[mid, end)`, once the directory has allocated or chosen `target`
    /// (spec.md §4.4 step 2, source side).
    pub fn begin_export(&self, mid: u32, target: Vec<String>) -> Result<(), ScaleError> {
        if !self.partition.try_begin_scale(ScaleDirection::SplittingOut) {
            return Err(ScaleError::AlreadyScaling);
        }
        let range = self.partition.slot_range();
        let new_name = range.partition_name();
        let new_metadata = format!("exporting:{}_{}:{}", mid, range.end, target.join("!"));
        self.engine
            .request(SCALE_CLIENT, 0, UPDATE_PARTITION, vec![
                Bytes::from(new_name),
                Bytes::from(new_metadata),
            ])?;
        Ok(())
    }

    /// Transitions the destination partition into `importing` for
    /// `[mid, end)` (spec.md §4.4 step 2, destination side). Called on
    /// the destination chain's own `ScaleCoordinator`.
    pub fn begin_import(&self, range: SlotRange) -> Result<(), ScaleError> {
        if !self.partition.try_begin_scale(ScaleDirection::MergingIn) {
            return Err(ScaleError::AlreadyScaling);
        }
        let own_name = self.partition.name();
        let new_metadata = format!("importing:{}_{}", range.begin, range.end);
        self.engine
            .request(SCALE_CLIENT, 0, UPDATE_PARTITION, vec![
                Bytes::from(own_name),
                Bytes::from(new_metadata),
            ])?;
        Ok(())
    }

    /// Drains up to `batch` keys from the export range to `destination`,
    /// pushing each via `scale_put` then replicating its removal locally
    /// as a `scale_remove` chain op (spec.md §4.4 step 3). Returns the
    /// number of keys drained in this call; callers loop until it
    /// returns 0 to interleave with ordinary client traffic.
    pub fn drain_once(
        &self,
        destination: &dyn DestinationClient,
        batch: usize,
    ) -> Result<usize, ScaleError> {
        let export_range = self.partition.export_slot_range();
        if export_range.is_empty() {
            return Ok(0);
        }
        let pairs = self.partition.scan_slot_range(export_range, batch);
        for (key, value) in &pairs {
            destination.scale_put(key, value)?;
            self.engine
                .request(SCALE_CLIENT, 0, SCALE_REMOVE, vec![key.clone()])?;
        }
        Ok(pairs.len())
    }

    /// Finalizes the export: renames this partition to `[begin, mid)` and
    /// clears scaling state (spec.md §4.4 step 4, source side).
    pub fn complete_export(&self, begin: u32, mid: u32) -> Result<(), ScaleError> {
        let new_name = SlotRange::new(begin, mid).partition_name();
        self.engine.request(
            SCALE_CLIENT,
            0,
            UPDATE_PARTITION,
            vec![Bytes::from(new_name), Bytes::from("regular")],
        )?;
        self.partition.end_scale();
        Ok(())
    }

    /// Finalizes the import: renames the destination partition to
    /// `[mid, end)` and clears scaling state (spec.md §4.4 step 4,
    /// destination side).
    pub fn complete_import(&self, mid: u32, end: u32) -> Result<(), ScaleError> {
        let new_name = SlotRange::new(mid, end).partition_name();
        self.engine.request(
            SCALE_CLIENT,
            0,
            UPDATE_PARTITION,
            vec![Bytes::from(new_name), Bytes::from("regular")],
        )?;
        self.partition.end_scale();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiffy_kernel::{HashTableConfig, Partition, PUT};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDestination {
        put: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
        renames: Mutex<Vec<(String, String)>>,
    }

    impl DestinationClient for RecordingDestination {
        fn scale_put(&self, key: &[u8], value: &[u8]) -> Result<(), LinkError> {
            self.put.lock().unwrap().push((key.to_vec(), value.to_vec()));
            Ok(())
        }

        fn update_partition(&self, new_name: &str, new_metadata: &str) -> Result<(), LinkError> {
            self.renames
                .lock()
                .unwrap()
                .push((new_name.to_string(), new_metadata.to_string()));
            Ok(())
        }
    }

    fn singleton_with(range: &str) -> (Arc<ChainEngine>, Arc<HashTablePartition>) {
        let partition = Arc::new(
            HashTablePartition::new(range, "regular", HashTableConfig::default()).unwrap(),
        );
        let engine = Arc::new(ChainEngine::new(partition.clone()));
        (engine, partition)
    }

    #[test]
    fn overload_triggers_and_split_drains_to_destination() {
        let (engine, partition) = singleton_with("0_65536");
        engine
            .request(ClientId::new(1), 1, PUT, vec![Bytes::from("k"), Bytes::from("v")])
            .unwrap();

        let coordinator = ScaleCoordinator::new(engine, partition.clone());
        coordinator.begin_export(32768, vec!["dest:1:2:3:4:0".to_string()]).unwrap();
        assert_eq!(partition.state(), jiffy_kernel::PartitionState::Exporting);

        let destination = RecordingDestination::default();
        let drained = coordinator.drain_once(&destination, 10).unwrap();
        // "k" may or may not land in the export half depending on its hash;
        // either way drain_once must terminate and report a count <= 1.
        assert!(drained <= 1);

        coordinator.complete_export(0, 32768).unwrap();
        assert_eq!(partition.slot_range(), SlotRange::new(0, 32768));
        assert_eq!(partition.state(), jiffy_kernel::PartitionState::Regular);
    }

    #[test]
    fn double_scale_is_rejected() {
        let (engine, partition) = singleton_with("0_65536");
        let coordinator = ScaleCoordinator::new(engine, partition);
        coordinator.begin_export(32768, vec!["dest".to_string()]).unwrap();
        let err = coordinator.begin_export(32768, vec!["dest".to_string()]);
        assert!(matches!(err, Err(ScaleError::AlreadyScaling)));
    }
}
