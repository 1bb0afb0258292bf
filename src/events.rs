// src/events.rs

//! Engine events and the sinks they are published to.
//!
//! The engine never talks to a transport directly. Everything observable
//! (loop lifecycle, per-node state, failures) goes through an [`EventSink`].
//! Publishing is infallible and must never block a pass.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

/// Per-node lifecycle state carried by `nodeState` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Executing,
    Completed,
    Error,
}

/// Everything the engine reports while running.
///
/// Serialized with a `"type"` tag and camelCase names, e.g.
/// `{"type":"iterationStarting","iterationNumber":3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EngineEvent {
    LoopStarted {
        workflow_id: u64,
        node_count: usize,
    },
    LoopStopped {
        workflow_id: u64,
        total_iterations: u64,
    },
    IterationStarting {
        iteration_number: u64,
    },
    IterationCompleted {
        iteration_number: u64,
        duration_seconds: f64,
    },
    NodeState {
        node_id: String,
        state: NodeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    WorkflowStarted {
        workflow_id: u64,
        node_count: usize,
    },
    WorkflowCompleted {
        workflow_id: u64,
        duration_seconds: f64,
    },
    WorkflowError {
        workflow_id: Option<u64>,
        message: String,
        trace: String,
    },
}

impl EngineEvent {
    /// Wire name of the event (`"loopStarted"`, `"nodeState"`, ...).
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::LoopStarted { .. } => "loopStarted",
            EngineEvent::LoopStopped { .. } => "loopStopped",
            EngineEvent::IterationStarting { .. } => "iterationStarting",
            EngineEvent::IterationCompleted { .. } => "iterationCompleted",
            EngineEvent::NodeState { .. } => "nodeState",
            EngineEvent::WorkflowStarted { .. } => "workflowStarted",
            EngineEvent::WorkflowCompleted { .. } => "workflowCompleted",
            EngineEvent::WorkflowError { .. } => "workflowError",
        }
    }

    pub fn node_state(node_id: &str, state: NodeStatus, data: Option<Value>) -> Self {
        EngineEvent::NodeState {
            node_id: node_id.to_string(),
            state,
            data,
        }
    }
}

/// Receives engine events.
///
/// Implementations decide what to do with them (forward, record, ignore).
/// `publish` is called from the engine's worker thread and must not block.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: EngineEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: EngineEvent) {}
}

/// Forwards events into a bounded tokio channel.
///
/// A full or closed channel drops the event.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<EngineEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink and the receiver that drains it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: EngineEvent) {
        if let Err(e) = self.sender.try_send(event) {
            trace!(error = %e, "dropping engine event");
        }
    }
}

/// Event handle given to a node instance, bound to its own node id.
///
/// Lets long-running nodes push intermediate state while they execute.
#[derive(Clone)]
pub struct NodeEvents {
    node_id: String,
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for NodeEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeEvents")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

impl NodeEvents {
    pub fn new(node_id: impl Into<String>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            node_id: node_id.into(),
            sink,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Publish an intermediate `executing` state carrying `data`.
    pub fn publish_update(&self, data: Value) {
        self.sink.publish(EngineEvent::node_state(
            &self.node_id,
            NodeStatus::Executing,
            Some(data),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_with_camel_case_tag() {
        let ev = EngineEvent::IterationCompleted {
            iteration_number: 2,
            duration_seconds: 0.5,
        };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({"type": "iterationCompleted", "iterationNumber": 2, "durationSeconds": 0.5})
        );

        let ev = EngineEvent::node_state("n1", NodeStatus::Error, Some(json!({"message": "boom"})));
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({"type": "nodeState", "nodeId": "n1", "state": "error", "data": {"message": "boom"}})
        );
        assert_eq!(ev.event_type(), "nodeState");
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::channel(1);
        sink.publish(EngineEvent::IterationStarting { iteration_number: 1 });
        sink.publish(EngineEvent::IterationStarting { iteration_number: 2 });

        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::IterationStarting { iteration_number: 1 }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn node_events_publish_executing_updates() {
        let (sink, mut rx) = ChannelSink::channel(4);
        let events = NodeEvents::new("cam", Arc::new(sink));
        events.publish_update(json!({"frame": 1}));

        match rx.try_recv().unwrap() {
            EngineEvent::NodeState { node_id, state, data } => {
                assert_eq!(node_id, "cam");
                assert_eq!(state, NodeStatus::Executing);
                assert_eq!(data, Some(json!({"frame": 1})));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
