#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use flowloop::events::{EngineEvent, EventSink, NodeStatus};

/// Event sink that keeps every published event in memory.
///
/// Clones share the same buffer, so a test can hand one clone to the engine
/// and inspect another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Wire names of all events, in publish order.
    pub fn types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(EngineEvent::event_type).collect()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    /// `iterationNumber` of every `iterationCompleted` event.
    pub fn completed_iterations(&self) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::IterationCompleted {
                    iteration_number, ..
                } => Some(*iteration_number),
                _ => None,
            })
            .collect()
    }

    /// `(node_id, state)` of every `nodeState` event.
    pub fn node_states(&self) -> Vec<(String, NodeStatus)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::NodeState { node_id, state, .. } => Some((node_id.clone(), *state)),
                _ => None,
            })
            .collect()
    }

    /// Poll until `predicate` holds for the recorded events or `timeout`
    /// passes. Returns whether it held.
    pub fn wait_for<F>(&self, timeout: Duration, mut predicate: F) -> bool
    where
        F: FnMut(&[EngineEvent]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate(&self.events.lock()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}
