//! Timer management for production runner.
//!
//! Timers are tokio tasks that sleep and then post the timer's event to the
//! runner. Setting a timer that is already pending replaces it.

use quorum_core::{Event, TimerId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Convert a TimerId to the corresponding Event.
pub(crate) fn timer_event(id: TimerId) -> Event {
    match id {
        TimerId::VertexRequest(request) => Event::VertexRequestTimeout { request },
        TimerId::LedgerSync => Event::LedgerSyncTimeout,
    }
}

/// Manages timers for the production runner.
pub struct TimerManager {
    /// Active timers (id -> task handle).
    timers: HashMap<TimerId, JoinHandle<()>>,
    /// Event sender for timer fires.
    event_tx: mpsc::Sender<Event>,
}

impl TimerManager {
    pub fn new(event_tx: mpsc::Sender<Event>) -> Self {
        Self {
            timers: HashMap::new(),
            event_tx,
        }
    }

    /// Set a timer that will fire after the given duration.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration) {
        self.cancel_timer(id);
        self.timers.retain(|_, handle| !handle.is_finished());

        let event_tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            trace!(timer_id = ?id, "Timer fired");
            // The runner has shut down if the channel is closed.
            let _ = event_tx.send(timer_event(id)).await;
        });

        self.timers.insert(id, handle);
        debug!(timer_id = ?id, ?duration, "Timer set");
    }

    /// Cancel a timer. A no-op if it does not exist or already fired.
    pub fn cancel_timer(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
            trace!(timer_id = ?id, "Timer cancelled");
        }
    }

    pub fn cancel_all(&mut self) {
        for (id, handle) in self.timers.drain() {
            handle.abort();
            trace!(timer_id = ?id, "Timer cancelled (shutdown)");
        }
    }

    /// Number of timers that have not fired or been cancelled.
    pub fn active_count(&self) -> usize {
        self.timers
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_messages::GetVerticesRequest;
    use quorum_types::Hash;

    fn vertex_timer(tag: &[u8]) -> TimerId {
        TimerId::VertexRequest(GetVerticesRequest::new(Hash::from_bytes(tag), 1))
    }

    #[tokio::test]
    async fn test_timer_fires() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(TimerId::LedgerSync, Duration::from_millis(10));

        let event = tokio::time::timeout(Duration::from_millis(500), event_rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert!(matches!(event, Event::LedgerSyncTimeout));
    }

    #[tokio::test]
    async fn test_timer_cancel() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(TimerId::LedgerSync, Duration::from_millis(50));
        manager.cancel_timer(TimerId::LedgerSync);

        let result = tokio::time::timeout(Duration::from_millis(150), event_rx.recv()).await;
        assert!(result.is_err(), "Timer should have been cancelled");
    }

    #[tokio::test]
    async fn test_timer_replace() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);
        let id = vertex_timer(b"a");

        manager.set_timer(id, Duration::from_secs(10));
        manager.set_timer(id, Duration::from_millis(10));
        assert_eq!(manager.active_count(), 1);

        let event = tokio::time::timeout(Duration::from_millis(500), event_rx.recv())
            .await
            .expect("timeout - timer didn't fire quickly")
            .expect("channel closed");
        match event {
            Event::VertexRequestTimeout { request } => {
                assert_eq!(TimerId::VertexRequest(request), id)
            }
            other => panic!("Expected VertexRequestTimeout, got {}", other.type_name()),
        }
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let (event_tx, mut event_rx) = mpsc::channel(10);
        let mut manager = TimerManager::new(event_tx);

        manager.set_timer(vertex_timer(b"a"), Duration::from_millis(50));
        manager.set_timer(vertex_timer(b"b"), Duration::from_millis(50));
        assert_eq!(manager.active_count(), 2);

        manager.cancel_all();
        assert_eq!(manager.active_count(), 0);

        let result = tokio::time::timeout(Duration::from_millis(150), event_rx.recv()).await;
        assert!(result.is_err(), "No timers should have fired");
    }
}
