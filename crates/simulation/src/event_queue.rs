//! Deterministic ordering of scheduled events.

use crate::NodeIndex;
use quorum_core::{Event, EventPriority};
use std::time::Duration;

/// Position of a scheduled event in the global queue.
///
/// Events fire by time, then priority, then node, then the order they were
/// scheduled in. Equal seeds therefore replay the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub time: Duration,
    pub priority: EventPriority,
    pub node_index: NodeIndex,
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, node_index: NodeIndex, sequence: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            node_index,
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_test_helpers::genesis_proof;
    use quorum_types::LocalSyncRequest;
    use std::collections::BTreeMap;

    fn timeout() -> Event {
        Event::LedgerSyncTimeout
    }

    fn internal() -> Event {
        Event::LocalSyncRequested {
            request: LocalSyncRequest {
                target: genesis_proof(),
                target_nodes: vec![],
            },
        }
    }

    #[test]
    fn test_time_orders_before_priority() {
        let later_internal = EventKey::new(Duration::from_millis(2), &internal(), 0, 1);
        let earlier_timer = EventKey::new(Duration::from_millis(1), &timeout(), 0, 2);
        assert!(earlier_timer < later_internal);
    }

    #[test]
    fn test_same_time_orders_by_priority_then_sequence() {
        let now = Duration::from_millis(5);
        let mut queue = BTreeMap::new();
        queue.insert(EventKey::new(now, &timeout(), 0, 1), "timer");
        queue.insert(EventKey::new(now, &internal(), 1, 2), "internal");
        queue.insert(EventKey::new(now, &timeout(), 0, 3), "second timer");

        let order: Vec<&str> = queue.into_values().collect();
        assert_eq!(order, vec!["internal", "timer", "second timer"]);
    }
}
