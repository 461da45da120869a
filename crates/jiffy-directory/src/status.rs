//! `data_status` DTO returned by the directory's `resolve` (spec.md §6).

use jiffy_types::BlockName;

/// Routing metadata for one data structure, as the directory hands it
/// back to a client library on `resolve(path)` or lease `renew(path)`.
///
/// `blocks` is one chain (a `Vec<BlockName>` in replica order, head
/// first) per partition of the data structure — a hash table with N
/// partitions has N chains, a FIFO queue has one.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DataStatus {
    pub data_type: String,
    pub backing_path: String,
    pub chain_length: usize,
    pub blocks: Vec<Vec<BlockName>>,
    pub flags: Vec<String>,
}

impl DataStatus {
    pub fn new(data_type: impl Into<String>, backing_path: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            backing_path: backing_path.into(),
            chain_length: 0,
            blocks: Vec::new(),
            flags: Vec::new(),
        }
    }

    pub fn with_chain(mut self, chain: Vec<BlockName>) -> Self {
        self.chain_length = chain.len();
        self.blocks.push(chain);
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_tracks_chain_length_of_last_added_chain() {
        let chain = vec![BlockName::new("h", 1, 2, 3, 4, 0)];
        let status = DataStatus::new("hashtable", "/a/b").with_chain(chain.clone());
        assert_eq!(status.chain_length, chain.len());
        assert_eq!(status.blocks, vec![chain]);
    }

    #[test]
    fn flags_round_trip() {
        let status = DataStatus::new("hashtable", "/a/b").with_flag("pinned");
        assert!(status.has_flag("pinned"));
        assert!(!status.has_flag("other"));
    }
}
