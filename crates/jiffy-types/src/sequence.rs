//! Sequence identifiers (spec.md §3 "Sequence identifier").

use std::fmt::{self, Display};

/// A pair `(client_seq, server_seq)`.
///
/// The client supplies `client_seq`; the head of the chain stamps
/// `server_seq` from a strictly monotonic per-partition counter.
/// `server_seq` is the canonical ordering key throughout the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SequenceId {
    pub client_seq: i64,
    pub server_seq: i64,
}

impl SequenceId {
    /// A sequence id as supplied by a client, before the head has stamped
    /// `server_seq`. Use [`SequenceId::stamped`] once the head assigns one.
    pub fn from_client(client_seq: i64) -> Self {
        Self {
            client_seq,
            server_seq: -1,
        }
    }

    /// Returns a copy of this sequence id with `server_seq` stamped.
    pub fn stamped(self, server_seq: i64) -> Self {
        Self {
            server_seq,
            ..self
        }
    }

    pub fn is_stamped(self) -> bool {
        self.server_seq >= 0
    }
}

impl Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.client_seq, self.server_seq)
    }
}

/// Ordering key used by the pending map and by `resend_pending`: strictly
/// by `server_seq`, ascending.
impl PartialOrd for SequenceId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SequenceId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.server_seq.cmp(&other.server_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamping_preserves_client_seq() {
        let seq = SequenceId::from_client(7).stamped(42);
        assert_eq!(seq.client_seq, 7);
        assert_eq!(seq.server_seq, 42);
        assert!(seq.is_stamped());
    }

    #[test]
    fn unstamped_sequence_is_not_stamped() {
        let seq = SequenceId::from_client(1);
        assert!(!seq.is_stamped());
    }

    #[test]
    fn ordering_is_by_server_seq() {
        let a = SequenceId::from_client(100).stamped(1);
        let b = SequenceId::from_client(1).stamped(2);
        assert!(a < b);
    }
}
