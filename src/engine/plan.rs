// src/engine/plan.rs

//! Compiled execution plan and its node instances.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::GraphError;
use crate::events::{EventSink, NodeEvents};
use crate::graph::{CompiledOrder, Edge, WorkflowGraph, compile};
use crate::node::{InputSchema, Node, NodeDescriptor, NodeRegistry};

/// One node of a plan: its instance plus everything needed to call it.
pub struct PlanNode {
    pub id: String,
    pub type_name: String,
    pub descriptor: Arc<NodeDescriptor>,
    pub function: String,
    /// Placement's embedded schema if it has one, else the descriptor's.
    pub schema: InputSchema,
    pub(crate) instance: Mutex<Box<dyn Node>>,
    parameters: RwLock<Map<String, Value>>,
}

impl std::fmt::Debug for PlanNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanNode")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("function", &self.function)
            .finish_non_exhaustive()
    }
}

impl PlanNode {
    /// Snapshot of the live parameter map.
    pub fn parameters(&self) -> Map<String, Value> {
        self.parameters.read().clone()
    }

    pub fn set_parameter(&self, name: &str, value: Value) {
        self.parameters.write().insert(name.to_string(), value);
    }
}

/// A validated, instantiated workflow ready to run.
///
/// Built once per workflow load. Parameter updates mutate it in place; they
/// never trigger a rebuild.
#[derive(Debug)]
pub struct ExecutionPlan {
    pub workflow_id: u64,
    compiled: CompiledOrder,
    nodes: HashMap<String, PlanNode>,
}

impl ExecutionPlan {
    /// Compile `graph`, resolve every node type and instantiate the nodes.
    pub fn build(
        workflow_id: u64,
        graph: &WorkflowGraph,
        registry: &NodeRegistry,
        sink: &Arc<dyn EventSink>,
    ) -> Result<Self, GraphError> {
        let compiled = compile(graph)?;
        let mut nodes = HashMap::with_capacity(compiled.order.len());

        for id in &compiled.order {
            let Some(placement) = graph.placement(id) else {
                continue;
            };

            let type_name = placement
                .type_name()
                .ok_or_else(|| GraphError::MissingNodeType(id.clone()))?
                .to_string();

            let descriptor =
                registry
                    .resolve(&type_name)
                    .map_err(|_| GraphError::UnknownNodeType {
                        node_id: id.clone(),
                        type_name: type_name.clone(),
                    })?;

            let mut instance = descriptor.instantiate();
            let function = descriptor.function.clone();
            if !instance.has_entry(&function) {
                return Err(GraphError::MissingFunction {
                    node_id: id.clone(),
                    function,
                });
            }
            instance.attach_events(NodeEvents::new(id.clone(), Arc::clone(sink)));

            let schema = match placement.embedded_input_types() {
                Some(Ok(schema)) => schema,
                Some(Err(e)) => {
                    warn!(node = %id, error = %e, "unreadable embedded input_types; using registered schema");
                    descriptor.inputs.clone()
                }
                None => descriptor.inputs.clone(),
            };

            let parameters = placement.parameters().cloned().unwrap_or_default();

            debug!(node = %id, node_type = %type_name, "instantiated node");
            nodes.insert(
                id.clone(),
                PlanNode {
                    id: id.clone(),
                    type_name,
                    descriptor,
                    function,
                    schema,
                    instance: Mutex::new(instance),
                    parameters: RwLock::new(parameters),
                },
            );
        }

        Ok(Self {
            workflow_id,
            compiled,
            nodes,
        })
    }

    pub fn order(&self) -> &[String] {
        &self.compiled.order
    }

    pub fn incoming(&self, node_id: &str) -> &[Edge] {
        self.compiled.incoming(node_id)
    }

    pub fn node(&self, node_id: &str) -> Option<&PlanNode> {
        self.nodes.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.compiled.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.order.is_empty()
    }

    /// Set a live parameter. Returns false if `node_id` is not in the plan.
    pub fn update_parameter(&self, node_id: &str, name: &str, value: Value) -> bool {
        match self.nodes.get(node_id) {
            Some(node) => {
                node.set_parameter(name, value);
                true
            }
            None => false,
        }
    }
}
