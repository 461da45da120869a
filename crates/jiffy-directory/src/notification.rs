//! Notification-bus contract consumed by the chain engine on commit
//! (SPEC_FULL.md §4.7, spec.md §8 scenario 6).
//!
//! The real fan-out — multi-subscriber pub/sub spanning a cluster — is
//! external (spec.md §1). What lives here is the sink trait the chain
//! engine's caller hands events to, plus an in-memory, interest-filtered
//! [`SubscriptionMap`] standing in for it in tests and as the
//! `jiffy-server` in-process default.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use jiffy_kernel::PartitionEvent;
use jiffy_types::BlockName;
use parking_lot::Mutex;

/// Receives the events a partition's mutating commands produced once
/// they've committed at the tail.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, block: &BlockName, events: &[PartitionEvent]);
}

/// A sink that drops every event. Default for blocks with no bound
/// notification bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _block: &BlockName, _events: &[PartitionEvent]) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Subscriber {
    id: SubscriberId,
    interests: Vec<&'static str>,
    queue: Vec<PartitionEvent>,
}

impl Subscriber {
    fn is_interested_in(&self, op: &str) -> bool {
        self.interests.iter().any(|i| *i == op)
    }
}

/// Interest-filtered, in-memory stand-in for a real pub/sub notification
/// bus (original `notification::subscription_map`, referenced but not
/// present in the retrieval pack — reconstructed from spec.md §8
/// scenario 6's observable behavior rather than translated source).
#[derive(Default)]
pub struct SubscriptionMap {
    by_block: Mutex<HashMap<BlockName, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl SubscriptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber on `block` interested only in the named
    /// ops (e.g. `["put", "remove"]`).
    pub fn subscribe(&self, block: BlockName, interests: Vec<&'static str>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.by_block.lock().entry(block).or_default().push(Subscriber {
            id,
            interests,
            queue: Vec::new(),
        });
        id
    }

    pub fn unsubscribe(&self, block: &BlockName, id: SubscriberId) {
        if let Some(subs) = self.by_block.lock().get_mut(block) {
            subs.retain(|s| s.id != id);
        }
    }

    /// Drains and returns everything delivered to `id` on `block` since
    /// the last drain.
    pub fn drain(&self, block: &BlockName, id: SubscriberId) -> Vec<PartitionEvent> {
        let mut guard = self.by_block.lock();
        let Some(subs) = guard.get_mut(block) else {
            return Vec::new();
        };
        match subs.iter_mut().find(|s| s.id == id) {
            Some(sub) => std::mem::take(&mut sub.queue),
            None => Vec::new(),
        }
    }
}

impl NotificationSink for SubscriptionMap {
    fn notify(&self, block: &BlockName, events: &[PartitionEvent]) {
        let Some(subs) = self.by_block.lock().get_mut(block).map(std::mem::take) else {
            return;
        };
        let mut subs = subs;
        for sub in &mut subs {
            for event in events {
                if sub.is_interested_in(event.op) {
                    sub.queue.push(event.clone());
                }
            }
        }
        self.by_block.lock().insert(block.clone(), subs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> BlockName {
        BlockName::new("h", 1, 2, 3, 4, 0)
    }

    #[test]
    fn subscribers_receive_only_their_interests() {
        let map = SubscriptionMap::new();
        let b = block();
        let put_only = map.subscribe(b.clone(), vec!["put"]);
        let both = map.subscribe(b.clone(), vec!["put", "remove"]);
        let remove_only = map.subscribe(b.clone(), vec!["remove"]);

        map.notify(&b, &[PartitionEvent::new("put", "K")]);
        map.notify(&b, &[PartitionEvent::new("remove", "K")]);

        assert_eq!(map.drain(&b, put_only).len(), 1);
        assert_eq!(map.drain(&b, both).len(), 2);
        assert_eq!(map.drain(&b, remove_only).len(), 1);
    }

    #[test]
    fn drain_is_empty_for_unknown_subscriber() {
        let map = SubscriptionMap::new();
        let b = block();
        assert!(map.drain(&b, SubscriberId(999)).is_empty());
    }

    #[test]
    fn unsubscribe_stops_further_delivery() {
        let map = SubscriptionMap::new();
        let b = block();
        let id = map.subscribe(b.clone(), vec!["put"]);
        map.unsubscribe(&b, id);
        map.notify(&b, &[PartitionEvent::new("put", "K")]);
        assert!(map.drain(&b, id).is_empty());
    }
}
