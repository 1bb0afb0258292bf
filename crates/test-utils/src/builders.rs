#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;

use flowloop::config::{EngineConfig, RawEngineConfig};
use flowloop::engine::Engine;
use flowloop::graph::{Edge, NodePlacement, WorkflowGraph};
use flowloop::node::NodeRegistry;
use flowloop::types::CacheMode;

use crate::recording_sink::RecordingSink;

/// Builder for `WorkflowGraph` to simplify test setup.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: WorkflowGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, id: &str, node_type: &str) -> Self {
        self.graph.nodes.push(NodePlacement::new(id, node_type));
        self
    }

    /// Node with parameters given as `(name, value)` pairs.
    pub fn node_with(mut self, id: &str, node_type: &str, params: &[(&str, Value)]) -> Self {
        let placement = params
            .iter()
            .fold(NodePlacement::new(id, node_type), |p, (name, value)| {
                p.with_parameter(name, value.clone())
            });
        self.graph.nodes.push(placement);
        self
    }

    pub fn placement(mut self, placement: NodePlacement) -> Self {
        self.graph.nodes.push(placement);
        self
    }

    /// Edge with default handles (`output` → `input`).
    pub fn edge(mut self, source: &str, target: &str) -> Self {
        self.graph.edges.push(Edge::new(source, target));
        self
    }

    pub fn edge_to(mut self, source: &str, source_handle: &str, target: &str, target_handle: &str) -> Self {
        self.graph
            .edges
            .push(Edge::new(source, target).with_handles(source_handle, target_handle));
        self
    }

    pub fn build(self) -> WorkflowGraph {
        self.graph
    }
}

/// Builder for an `Engine` wired to a `RecordingSink`.
pub struct EngineBuilder {
    registry: NodeRegistry,
    config: RawEngineConfig,
}

impl EngineBuilder {
    pub fn new(registry: NodeRegistry) -> Self {
        let mut config = RawEngineConfig::default();
        // Fast loops by default in tests.
        config.engine.interval_seconds = 0.01;
        config.engine.join_timeout_seconds = 2.0;
        Self { registry, config }
    }

    pub fn interval(mut self, seconds: f64) -> Self {
        self.config.engine.interval_seconds = seconds;
        self
    }

    pub fn strict_validation(mut self, strict: bool) -> Self {
        self.config.engine.strict_validation = strict;
        self
    }

    pub fn cache(mut self, mode: CacheMode) -> Self {
        self.config.cache.mode = mode;
        self
    }

    pub fn build(self) -> (Engine, RecordingSink) {
        let config =
            EngineConfig::try_from(self.config).expect("Failed to build valid config from builder");
        let sink = RecordingSink::new();
        let engine = Engine::new(Arc::new(self.registry), Arc::new(sink.clone()), &config);
        (engine, sink)
    }
}
