//! Hash-table partition metadata (spec.md §3 "Hash-table partition").

use jiffy_types::SlotRange;

/// The partition's auxiliary state during slot migration (spec.md §3,
/// §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionState {
    Regular,
    Importing,
    Exporting,
}

/// Which direction an in-flight auto-scale is moving this partition.
///
/// Supplemental vs. spec.md's bare `state` field — grounded on the
/// original `scaling_up_`/`scaling_down_` bools in
/// `original_source/.../hash_table_partition.h`, which exist precisely to
/// stop a second overload/underload trigger from firing while one scale is
/// already in flight for this partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    SplittingOut,
    MergingIn,
}

/// Everything guarded by `metadata_mtx` (spec.md §5).
#[derive(Debug, Clone)]
pub struct HashPartitionMetadata {
    pub name: String,
    pub metadata_str: String,
    pub slot_range: SlotRange,
    pub state: PartitionState,
    pub export_slot_range: SlotRange,
    pub import_slot_range: SlotRange,
    pub export_target: Vec<String>,
    pub export_target_str: String,
    pub scale_direction: Option<ScaleDirection>,
}

impl HashPartitionMetadata {
    pub fn new(slot_range: SlotRange) -> Self {
        Self {
            name: slot_range.partition_name(),
            metadata_str: "regular".to_string(),
            slot_range,
            state: PartitionState::Regular,
            export_slot_range: SlotRange::empty(),
            import_slot_range: SlotRange::empty(),
            export_target: Vec::new(),
            export_target_str: String::new(),
            scale_direction: None,
        }
    }

    /// Applies a `new_metadata` string of the form `"regular"`,
    /// `"importing:<begin>_<end>"`, or
    /// `"exporting:<begin>_<end>:<target1>!<target2>!..."` — the metadata
    /// encoding spec.md §4.3/§4.4 leave open; grounded on the original
    /// `export_target(string)` setter, which splits targets on `'!'`.
    pub fn apply_metadata_str(&mut self, new_metadata: &str) -> Result<(), MetadataParseError> {
        let mut parts = new_metadata.splitn(3, ':');
        let kind = parts
            .next()
            .ok_or_else(|| MetadataParseError(new_metadata.to_string()))?;
        match kind {
            "regular" => {
                self.state = PartitionState::Regular;
                self.export_slot_range = SlotRange::empty();
                self.import_slot_range = SlotRange::empty();
                self.export_target.clear();
                self.export_target_str.clear();
            }
            "importing" => {
                let range = parts
                    .next()
                    .ok_or_else(|| MetadataParseError(new_metadata.to_string()))?;
                self.import_slot_range = SlotRange::parse(range)
                    .map_err(|_| MetadataParseError(new_metadata.to_string()))?;
                self.state = PartitionState::Importing;
            }
            "exporting" => {
                let range = parts
                    .next()
                    .ok_or_else(|| MetadataParseError(new_metadata.to_string()))?;
                let targets = parts.next().unwrap_or("");
                self.export_slot_range = SlotRange::parse(range)
                    .map_err(|_| MetadataParseError(new_metadata.to_string()))?;
                self.export_target = targets.split('!').filter(|s| !s.is_empty()).map(String::from).collect();
                self.export_target_str = targets.to_string();
                self.state = PartitionState::Exporting;
            }
            _ => return Err(MetadataParseError(new_metadata.to_string())),
        }
        self.metadata_str = new_metadata.to_string();
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed partition metadata: {0:?}")]
pub struct MetadataParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_clears_ranges() {
        let mut m = HashPartitionMetadata::new(SlotRange::full());
        m.apply_metadata_str("exporting:0_100:a!b").unwrap();
        m.apply_metadata_str("regular").unwrap();
        assert_eq!(m.state, PartitionState::Regular);
        assert!(m.export_slot_range.is_empty());
        assert!(m.export_target.is_empty());
    }

    #[test]
    fn exporting_parses_range_and_colon_heavy_targets() {
        let mut m = HashPartitionMetadata::new(SlotRange::full());
        m.apply_metadata_str("exporting:32768_65536:host1:1:2:3:4:0!host2:1:2:3:4:1")
            .unwrap();
        assert_eq!(m.state, PartitionState::Exporting);
        assert_eq!(m.export_slot_range, SlotRange::new(32768, 65536));
        assert_eq!(
            m.export_target,
            vec!["host1:1:2:3:4:0".to_string(), "host2:1:2:3:4:1".to_string()]
        );
    }

    #[test]
    fn importing_parses_range() {
        let mut m = HashPartitionMetadata::new(SlotRange::full());
        m.apply_metadata_str("importing:0_32768").unwrap();
        assert_eq!(m.state, PartitionState::Importing);
        assert_eq!(m.import_slot_range, SlotRange::new(0, 32768));
    }
}
