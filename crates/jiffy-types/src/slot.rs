//! Hash-slot ranges (spec.md §3 glossary "Slot range").

use std::fmt::{self, Display};

/// The size of the hash-slot universe shared by every hash partition of a
/// data structure (spec.md §4.3 "Hash function").
pub const SLOT_UNIVERSE: u32 = 65536;

/// A half-open `[begin, end)` range within `[0, SLOT_UNIVERSE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SlotRange {
    pub begin: u32,
    pub end: u32,
}

impl SlotRange {
    pub fn new(begin: u32, end: u32) -> Self {
        debug_assert!(begin <= end, "slot range begin must not exceed end");
        debug_assert!(end <= SLOT_UNIVERSE, "slot range end exceeds universe size");
        Self { begin, end }
    }

    /// The full `[0, 65536)` universe, the default range for a single
    /// unsharded hash-table partition.
    pub fn full() -> Self {
        Self::new(0, SLOT_UNIVERSE)
    }

    /// An empty range, used to represent "no export/import in flight".
    pub fn empty() -> Self {
        Self { begin: 0, end: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    pub fn contains(&self, slot: u32) -> bool {
        slot >= self.begin && slot < self.end
    }

    pub fn midpoint(&self) -> u32 {
        self.begin + (self.end - self.begin) / 2
    }

    /// Splits this range into two halves at the midpoint. Used when a
    /// partition overloads and must be split in two (spec.md §4.4 step 1).
    pub fn split_at_midpoint(&self) -> (SlotRange, SlotRange) {
        let mid = self.midpoint();
        (SlotRange::new(self.begin, mid), SlotRange::new(mid, self.end))
    }

    /// The canonical hash-table partition name for this range
    /// (`"<begin>_<end>"`, spec.md §6 "Partition names").
    pub fn partition_name(&self) -> String {
        format!("{}_{}", self.begin, self.end)
    }

    /// Parses a partition name of the form `"<begin>_<end>"`.
    pub fn parse(name: &str) -> Result<Self, SlotRangeParseError> {
        let (begin, end) = name
            .split_once('_')
            .ok_or_else(|| SlotRangeParseError::Malformed(name.to_string()))?;
        let begin: u32 = begin
            .parse()
            .map_err(|_| SlotRangeParseError::Malformed(name.to_string()))?;
        let end: u32 = end
            .parse()
            .map_err(|_| SlotRangeParseError::Malformed(name.to_string()))?;
        if end > SLOT_UNIVERSE || begin > end {
            return Err(SlotRangeParseError::OutOfBounds(name.to_string()));
        }
        Ok(Self { begin, end })
    }
}

impl Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.partition_name())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SlotRangeParseError {
    #[error("malformed slot range name: {0:?}")]
    Malformed(String),
    #[error("slot range out of bounds: {0:?}")]
    OutOfBounds(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_range_covers_universe() {
        let r = SlotRange::full();
        assert!(r.contains(0));
        assert!(r.contains(65535));
        assert!(!r.contains(65536));
    }

    #[test]
    fn split_halves_are_disjoint_and_cover_original() {
        let r = SlotRange::new(0, 32768);
        let (lo, hi) = r.split_at_midpoint();
        assert_eq!(lo.end, hi.begin);
        assert_eq!(lo.begin, r.begin);
        assert_eq!(hi.end, r.end);
    }

    #[test]
    fn round_trips_through_partition_name() {
        let r = SlotRange::new(1000, 2000);
        let parsed = SlotRange::parse(&r.partition_name()).unwrap();
        assert_eq!(r, parsed);
    }

    #[test]
    fn rejects_out_of_bounds_range() {
        assert!(SlotRange::parse("0_70000").is_err());
    }

    #[test]
    fn rejects_malformed_name() {
        assert!(SlotRange::parse("not-a-range").is_err());
    }
}
