//! The hash-table partition (spec.md §4.3).

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use jiffy_types::{sentinel, status, status_with, ArgList, CommandId, SlotRange};
use parking_lot::{Mutex, RwLock};

use crate::command::{CommandOutcome, CommandTable};
use crate::events::PartitionEvent;
use crate::hash_table::commands::{self, build_command_table};
use crate::hash_table::hash::hash_slot;
use crate::hash_table::metadata::{HashPartitionMetadata, PartitionState, ScaleDirection};
use crate::partition::{KernelError, Partition};

/// Configuration fixed at construction time (spec.md §4.3 thresholds).
#[derive(Debug, Clone, Copy)]
pub struct HashTableConfig {
    pub capacity_bytes: usize,
    pub threshold_lo: f64,
    pub threshold_hi: f64,
    pub auto_scale: bool,
}

impl Default for HashTableConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 64 * 1024 * 1024,
            threshold_lo: 0.25,
            threshold_hi: 0.75,
            auto_scale: true,
        }
    }
}

/// A concurrent hash-table partition. Interior mutability (`RwLock`/
/// `Mutex`/atomics) lets `dispatch` take `&self`; the chain engine above
/// is what actually serializes mutation order (spec.md §5 `request_mtx`).
pub struct HashTablePartition {
    metadata: RwLock<HashPartitionMetadata>,
    map: RwLock<HashMap<Bytes, Bytes>>,
    size_bytes: AtomicUsize,
    dirty: AtomicBool,
    update_mtx: Mutex<()>,
    table: CommandTable,
    config: HashTableConfig,
}

impl HashTablePartition {
    pub fn new(name: &str, metadata_str: &str, config: HashTableConfig) -> Result<Self, KernelError> {
        let slot_range = SlotRange::parse(name)
            .map_err(|e| KernelError::Serde(e.to_string()))?;
        let mut meta = HashPartitionMetadata::new(slot_range);
        if metadata_str != "regular" {
            meta.apply_metadata_str(metadata_str)
                .map_err(|e| KernelError::Serde(e.to_string()))?;
        }
        Ok(Self {
            metadata: RwLock::new(meta),
            map: RwLock::new(HashMap::new()),
            size_bytes: AtomicUsize::new(0),
            dirty: AtomicBool::new(false),
            update_mtx: Mutex::new(()),
            table: build_command_table(),
            config,
        })
    }

    pub fn slot_range(&self) -> SlotRange {
        self.metadata.read().slot_range
    }

    pub fn name(&self) -> String {
        self.metadata.read().name.clone()
    }

    pub fn metadata_str(&self) -> String {
        self.metadata.read().metadata_str.clone()
    }

    pub fn state(&self) -> PartitionState {
        self.metadata.read().state
    }

    pub fn export_slot_range(&self) -> SlotRange {
        self.metadata.read().export_slot_range
    }

    pub fn import_slot_range(&self) -> SlotRange {
        self.metadata.read().import_slot_range
    }

    pub fn export_target(&self) -> Vec<String> {
        self.metadata.read().export_target.clone()
    }

    /// Atomically claims this partition for an auto-scale operation.
    /// Returns `false` if a scale is already in flight (grounded on the
    /// original `scaling_up_`/`scaling_down_` guard bools).
    pub fn try_begin_scale(&self, direction: ScaleDirection) -> bool {
        let mut meta = self.metadata.write();
        if meta.scale_direction.is_some() {
            return false;
        }
        meta.scale_direction = Some(direction);
        true
    }

    pub fn end_scale(&self) {
        self.metadata.write().scale_direction = None;
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if the partition's live size exceeds `threshold_hi * capacity`
    /// (spec.md §4.4 "overload()").
    pub fn overload(&self) -> bool {
        self.storage_size() as f64 > self.config.threshold_hi * self.config.capacity_bytes as f64
    }

    /// `true` if the partition's live size is below `threshold_lo * capacity`
    /// (spec.md §4.4 "underload()").
    pub fn underload(&self) -> bool {
        self.storage_size() as f64 < self.config.threshold_lo * self.config.capacity_bytes as f64
    }

    pub fn auto_scale_enabled(&self) -> bool {
        self.config.auto_scale
    }

    /// Scans for up to `max` `(K, V)` pairs whose hash lies in `range`,
    /// used both by the `get_data_in_slot_range` command and directly by
    /// the scaling driver's export scan (spec.md §4.2 "Forward-all" /
    /// §4.4 step 3).
    pub fn scan_slot_range(&self, range: SlotRange, max: usize) -> Vec<(Bytes, Bytes)> {
        let map = self.map.read();
        map.iter()
            .filter(|(k, _)| range.contains(hash_slot(k)))
            .take(max)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn entry_cost(key: &Bytes, value: &Bytes) -> usize {
        key.len() + value.len()
    }

    /// Routes an incoming key against the partition's owned territory
    /// (spec.md §4.3 "Admission & routing on every mutation"). Returns
    /// `Some(response)` if the op must be rejected/redirected, `None` if
    /// it's admissible and should proceed against local state.
    fn route(&self, key: &[u8]) -> Option<ArgList> {
        let meta = self.metadata.read();
        let slot = hash_slot(key);
        let locally_owned = meta.slot_range.contains(slot);
        let importing_here =
            meta.state == PartitionState::Importing && meta.import_slot_range.contains(slot);
        if !locally_owned && !importing_here {
            return Some(status_with(sentinel::BLOCK_MOVED, meta.export_target_str.clone()));
        }
        // Exporting keys in the drain range are accepted locally until the
        // rename completes (spec.md §4.3 rule 2).
        None
    }

    fn check_capacity(&self, additional: usize) -> bool {
        let projected = self.storage_size() + additional;
        projected as f64 > self.config.threshold_hi * self.config.capacity_bytes as f64
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn cmd_exists(&self, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        let key = arg(args, 0, EXISTS)?;
        let exists = self.map.read().contains_key(key.as_ref());
        Ok(CommandOutcome::response_only(status(if exists {
            "true"
        } else {
            "false"
        })))
    }

    fn cmd_get(&self, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        let key = arg(args, 0, GET)?;
        if let Some(resp) = self.route(key) {
            return Ok(CommandOutcome::response_only(resp));
        }
        // `route` only redirects keys outside `slot_range` entirely; a key
        // still inside the draining `export_slot_range` is locally owned
        // but already promised to the destination (spec.md §4.3 `get`).
        let meta = self.metadata.read();
        if meta.state == PartitionState::Exporting && meta.export_slot_range.contains(hash_slot(key)) {
            return Ok(CommandOutcome::response_only(status_with(
                sentinel::BLOCK_MOVED,
                meta.export_target_str.clone(),
            )));
        }
        drop(meta);
        let resp = match self.map.read().get(key.as_ref()) {
            Some(v) => vec![v.clone()],
            None => status(sentinel::KEY_NOT_FOUND),
        };
        Ok(CommandOutcome::response_only(resp))
    }

    fn cmd_put(&self, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        let key = arg(args, 0, PUT)?.clone();
        let value = arg(args, 1, PUT)?.clone();
        if let Some(resp) = self.route(&key) {
            return Ok(CommandOutcome::response_only(resp));
        }
        if self.check_capacity(Self::entry_cost(&key, &value)) {
            return Ok(CommandOutcome::response_only(status(sentinel::FULL)));
        }
        let mut map = self.map.write();
        if map.contains_key(key.as_ref()) {
            return Ok(CommandOutcome::response_only(status(sentinel::DUPLICATE_KEY)));
        }
        let cost = Self::entry_cost(&key, &value);
        map.insert(key.clone(), value);
        drop(map);
        self.size_bytes.fetch_add(cost, Ordering::AcqRel);
        self.mark_dirty();
        Ok(CommandOutcome::with_event(
            status(sentinel::OK),
            PartitionEvent::new("put", key),
        ))
    }

    fn cmd_upsert(&self, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        let key = arg(args, 0, UPSERT)?.clone();
        let value = arg(args, 1, UPSERT)?.clone();
        if let Some(resp) = self.route(&key) {
            return Ok(CommandOutcome::response_only(resp));
        }
        let mut map = self.map.write();
        let old_cost = map
            .get(key.as_ref())
            .map(|v| Self::entry_cost(&key, v))
            .unwrap_or(0);
        let new_cost = Self::entry_cost(&key, &value);
        map.insert(key.clone(), value);
        drop(map);
        if new_cost > old_cost {
            self.size_bytes.fetch_add(new_cost - old_cost, Ordering::AcqRel);
        } else {
            self.size_bytes.fetch_sub(old_cost - new_cost, Ordering::AcqRel);
        }
        self.mark_dirty();
        Ok(CommandOutcome::with_event(
            status(sentinel::OK),
            PartitionEvent::new("upsert", key),
        ))
    }

    fn cmd_update(&self, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        let key = arg(args, 0, UPDATE)?.clone();
        let value = arg(args, 1, UPDATE)?.clone();
        if let Some(resp) = self.route(&key) {
            return Ok(CommandOutcome::response_only(resp));
        }
        let mut map = self.map.write();
        let Some(old) = map.get(key.as_ref()).cloned() else {
            return Ok(CommandOutcome::response_only(status(sentinel::KEY_NOT_FOUND)));
        };
        let old_cost = Self::entry_cost(&key, &old);
        let new_cost = Self::entry_cost(&key, &value);
        map.insert(key.clone(), value);
        drop(map);
        if new_cost > old_cost {
            self.size_bytes.fetch_add(new_cost - old_cost, Ordering::AcqRel);
        } else {
            self.size_bytes.fetch_sub(old_cost - new_cost, Ordering::AcqRel);
        }
        self.mark_dirty();
        Ok(CommandOutcome::with_event(
            vec![old],
            PartitionEvent::new("update", key),
        ))
    }

    fn cmd_remove(&self, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        let key = arg(args, 0, REMOVE)?.clone();
        if let Some(resp) = self.route(&key) {
            return Ok(CommandOutcome::response_only(resp));
        }
        let mut map = self.map.write();
        let Some(old) = map.remove(key.as_ref()) else {
            return Ok(CommandOutcome::response_only(status(sentinel::KEY_NOT_FOUND)));
        };
        drop(map);
        self.size_bytes
            .fetch_sub(Self::entry_cost(&key, &old), Ordering::AcqRel);
        self.mark_dirty();
        Ok(CommandOutcome::with_event(
            vec![old],
            PartitionEvent::new("remove", key),
        ))
    }

    fn cmd_scale_put(&self, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        let key = arg(args, 0, commands::SCALE_PUT)?.clone();
        let value = arg(args, 1, commands::SCALE_PUT)?.clone();
        let meta = self.metadata.read();
        let slot = hash_slot(&key);
        if meta.state != PartitionState::Importing || !meta.import_slot_range.contains(slot) {
            return Ok(CommandOutcome::response_only(status(sentinel::WRONG_STATE)));
        }
        drop(meta);
        let mut map = self.map.write();
        let old_cost = map
            .get(key.as_ref())
            .map(|v| Self::entry_cost(&key, v))
            .unwrap_or(0);
        let new_cost = Self::entry_cost(&key, &value);
        map.insert(key.clone(), value);
        drop(map);
        if new_cost > old_cost {
            self.size_bytes.fetch_add(new_cost - old_cost, Ordering::AcqRel);
        } else {
            self.size_bytes.fetch_sub(old_cost - new_cost, Ordering::AcqRel);
        }
        self.mark_dirty();
        Ok(CommandOutcome::response_only(status(sentinel::OK)))
    }

    fn cmd_scale_remove(&self, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        let key = arg(args, 0, commands::SCALE_REMOVE)?.clone();
        let meta = self.metadata.read();
        let slot = hash_slot(&key);
        if meta.state != PartitionState::Exporting || !meta.export_slot_range.contains(slot) {
            return Ok(CommandOutcome::response_only(status(sentinel::WRONG_STATE)));
        }
        drop(meta);
        let mut map = self.map.write();
        if let Some(old) = map.remove(key.as_ref()) {
            drop(map);
            self.size_bytes
                .fetch_sub(Self::entry_cost(&key, &old), Ordering::AcqRel);
        }
        self.mark_dirty();
        Ok(CommandOutcome::response_only(status(sentinel::OK)))
    }

    fn cmd_get_data_in_slot_range(&self, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        let begin = u32_arg(args, 0, commands::GET_DATA_IN_SLOT_RANGE)?;
        let end = u32_arg(args, 1, commands::GET_DATA_IN_SLOT_RANGE)?;
        let max = u32_arg(args, 2, commands::GET_DATA_IN_SLOT_RANGE)? as usize;
        let range = SlotRange::new(begin, end);
        let pairs = self.scan_slot_range(range, max);
        let mut resp = status(sentinel::OK);
        for (k, v) in pairs {
            resp.push(k);
            resp.push(v);
        }
        Ok(CommandOutcome::response_only(resp))
    }

    fn cmd_update_partition(&self, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        let new_name = str_arg(args, 0, commands::UPDATE_PARTITION)?;
        let new_metadata = str_arg(args, 1, commands::UPDATE_PARTITION)?;
        let new_range = SlotRange::parse(new_name).map_err(|e| KernelError::Serde(e.to_string()))?;
        let mut meta = self.metadata.write();
        meta.slot_range = new_range;
        meta.name = new_name.to_string();
        meta.apply_metadata_str(new_metadata)
            .map_err(|e| KernelError::Serde(e.to_string()))?;
        drop(meta);
        self.mark_dirty();
        Ok(CommandOutcome::response_only(status(sentinel::OK)))
    }

    fn cmd_get_metadata(&self) -> Result<CommandOutcome, KernelError> {
        let meta = self.metadata.read();
        Ok(CommandOutcome::response_only(status_with(
            sentinel::OK,
            meta.metadata_str.clone(),
        )))
    }

    fn cmd_get_storage_size(&self) -> Result<CommandOutcome, KernelError> {
        let size = self.storage_size().to_string();
        Ok(CommandOutcome::response_only(status_with(sentinel::OK, size)))
    }
}

fn arg<'a>(args: &'a ArgList, idx: usize, cmd: CommandId) -> Result<&'a Bytes, KernelError> {
    args.get(idx).ok_or(KernelError::MalformedArgs {
        cmd,
        expected: "more arguments",
        got: args.len(),
    })
}

fn str_arg(args: &ArgList, idx: usize, cmd: CommandId) -> Result<&str, KernelError> {
    let bytes = arg(args, idx, cmd)?;
    std::str::from_utf8(bytes).map_err(|_| KernelError::MalformedArgs {
        cmd,
        expected: "utf8 string",
        got: args.len(),
    })
}

fn u32_arg(args: &ArgList, idx: usize, cmd: CommandId) -> Result<u32, KernelError> {
    str_arg(args, idx, cmd)?
        .parse()
        .map_err(|_| KernelError::MalformedArgs {
            cmd,
            expected: "integer",
            got: args.len(),
        })
}

impl Partition for HashTablePartition {
    fn command_table(&self) -> &CommandTable {
        &self.table
    }

    fn dispatch(&self, cmd: CommandId, args: &ArgList) -> Result<CommandOutcome, KernelError> {
        use commands::*;
        match cmd {
            EXISTS => self.cmd_exists(args),
            GET => self.cmd_get(args),
            PUT => self.cmd_put(args),
            UPSERT => self.cmd_upsert(args),
            UPDATE => self.cmd_update(args),
            REMOVE => self.cmd_remove(args),
            SCALE_PUT => self.cmd_scale_put(args),
            SCALE_REMOVE => self.cmd_scale_remove(args),
            GET_DATA_IN_SLOT_RANGE => self.cmd_get_data_in_slot_range(args),
            UPDATE_PARTITION => self.cmd_update_partition(args),
            GET_METADATA => self.cmd_get_metadata(),
            GET_STORAGE_SIZE => self.cmd_get_storage_size(),
            other => Err(KernelError::UnknownCommand(other)),
        }
    }

    fn load(&self, path: &Path) -> Result<(), KernelError> {
        let _guard = self.update_mtx.lock();
        let bytes = std::fs::read(path)?;
        let entries: Vec<(Vec<u8>, Vec<u8>)> =
            postcard::from_bytes(&bytes).map_err(|e| KernelError::Serde(e.to_string()))?;
        let mut map = self.map.write();
        map.clear();
        let mut size = 0usize;
        for (k, v) in entries {
            size += k.len() + v.len();
            map.insert(Bytes::from(k), Bytes::from(v));
        }
        self.size_bytes.store(size, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }

    fn sync(&self, path: &Path) -> Result<bool, KernelError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        let _guard = self.update_mtx.lock();
        let map = self.map.read();
        let entries: Vec<(&[u8], &[u8])> = map.iter().map(|(k, v)| (k.as_ref(), v.as_ref())).collect();
        let bytes = postcard::to_allocvec(&entries).map_err(|e| KernelError::Serde(e.to_string()))?;
        drop(map);
        std::fs::write(path, bytes)?;
        self.dirty.store(false, Ordering::Release);
        Ok(true)
    }

    fn dump(&self, path: &Path) -> Result<bool, KernelError> {
        let synced = self.sync(path)?;
        let mut map = self.map.write();
        map.clear();
        drop(map);
        self.size_bytes.store(0, Ordering::Release);
        Ok(synced)
    }

    fn storage_size(&self) -> usize {
        self.size_bytes.load(Ordering::Acquire)
    }

    fn storage_capacity(&self) -> usize {
        self.config.capacity_bytes
    }

    fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn forward_all_ops(&self) -> Vec<(CommandId, ArgList)> {
        let _guard = self.update_mtx.lock();
        let map = self.map.read();
        map.iter()
            .map(|(k, v)| {
                (
                    commands::SCALE_PUT,
                    vec![k.clone(), v.clone()],
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes as ByteString;

    fn full() -> HashTablePartition {
        HashTablePartition::new("0_65536", "regular", HashTableConfig::default()).unwrap()
    }

    fn b(s: &str) -> ByteString {
        ByteString::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn put_then_get_round_trips() {
        let p = full();
        let out = p.dispatch(commands::PUT, &vec![b("k"), b("v")]).unwrap();
        assert_eq!(&out.response[0][..], b"!ok");
        assert_eq!(out.events.len(), 1);
        let out = p.dispatch(commands::GET, &vec![b("k")]).unwrap();
        assert_eq!(&out.response[0][..], b"v");
    }

    #[test]
    fn duplicate_put_is_rejected() {
        let p = full();
        p.dispatch(commands::PUT, &vec![b("k"), b("v")]).unwrap();
        let out = p.dispatch(commands::PUT, &vec![b("k"), b("v2")]).unwrap();
        assert_eq!(&out.response[0][..], b"!duplicate_key");
    }

    #[test]
    fn get_missing_key_not_found() {
        let p = full();
        let out = p.dispatch(commands::GET, &vec![b("missing")]).unwrap();
        assert_eq!(&out.response[0][..], b"!key_not_found");
    }

    #[test]
    fn remove_returns_old_value() {
        let p = full();
        p.dispatch(commands::PUT, &vec![b("k"), b("v")]).unwrap();
        let out = p.dispatch(commands::REMOVE, &vec![b("k")]).unwrap();
        assert_eq!(&out.response[0][..], b"v");
        let out = p.dispatch(commands::GET, &vec![b("k")]).unwrap();
        assert_eq!(&out.response[0][..], b"!key_not_found");
    }

    #[test]
    fn out_of_range_key_is_redirected() {
        let p = HashTablePartition::new("0_100", "regular", HashTableConfig::default()).unwrap();
        // "k" hashes somewhere in [0, 65536); force a mismatch by picking a
        // narrow owned range that almost certainly excludes it.
        let out = p.dispatch(commands::PUT, &vec![b("some-unrelated-key"), b("v")]).unwrap();
        if hash_slot(b"some-unrelated-key".as_ref()) >= 100 {
            assert_eq!(&out.response[0][..], b"!block_moved");
        }
    }

    #[test]
    fn get_redirects_while_exporting_key_in_drain_range() {
        let p = full();
        p.dispatch(commands::PUT, &vec![b("k"), b("v")]).unwrap();
        p.dispatch(
            commands::UPDATE_PARTITION,
            &vec![b("0_65536"), b("exporting:0_65536:host:1:2:3:4:0")],
        )
        .unwrap();
        let out = p.dispatch(commands::GET, &vec![b("k")]).unwrap();
        assert_eq!(&out.response[0][..], b"!block_moved");
        assert_eq!(&out.response[1][..], b"host:1:2:3:4:0");
    }

    #[test]
    fn scale_put_rejected_outside_importing_state() {
        let p = full();
        let out = p.dispatch(commands::SCALE_PUT, &vec![b("k"), b("v")]).unwrap();
        assert_eq!(&out.response[0][..], b"!wrong_state");
    }

    #[test]
    fn scale_put_accepted_while_importing_matching_range() {
        let p = HashTablePartition::new("0_65536", "importing:0_65536", HashTableConfig::default())
            .unwrap();
        let out = p.dispatch(commands::SCALE_PUT, &vec![b("k"), b("v")]).unwrap();
        assert_eq!(&out.response[0][..], b"!ok");
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn update_partition_changes_range_and_state() {
        let p = full();
        p.dispatch(
            commands::UPDATE_PARTITION,
            &vec![b("0_32768"), b("exporting:32768_65536:host:1:2:3:4:0")],
        )
        .unwrap();
        assert_eq!(p.slot_range(), SlotRange::new(0, 32768));
        assert_eq!(p.state(), PartitionState::Exporting);
    }

    #[test]
    fn scan_slot_range_filters_by_hash() {
        let p = full();
        p.dispatch(commands::PUT, &vec![b("alpha"), b("1")]).unwrap();
        p.dispatch(commands::PUT, &vec![b("beta"), b("2")]).unwrap();
        let all = p.scan_slot_range(SlotRange::full(), 100);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn overload_and_underload_respect_thresholds() {
        let config = HashTableConfig {
            capacity_bytes: 10,
            threshold_lo: 0.2,
            threshold_hi: 0.5,
            auto_scale: true,
        };
        let p = HashTablePartition::new("0_65536", "regular", config).unwrap();
        assert!(p.underload());
        assert!(!p.overload());
        p.dispatch(commands::PUT, &vec![b("k"), b("123456789")]).unwrap();
        assert!(p.overload());
    }
}
