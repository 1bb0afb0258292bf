// src/node/mod.rs

//! The node capability contract.
//!
//! A node type is a [`NodeDescriptor`] (schemas, entry function, metadata and
//! a constructor) plus the [`Node`] objects it builds. The engine only ever
//! talks to nodes through the [`Node`] trait.

pub mod basic;
pub mod library;
pub mod registry;
pub mod schema;

use serde_json::{Map, Value};

pub use library::NodeLibrary;
pub use registry::{DiscoveryReport, ModuleLoad, NodeRegistry};
pub use schema::{
    InputOptions, InputSchema, InputSpec, InputType, NodeDescriptor, NodeInfo, NodeMetadata,
    ValidationError,
};

use crate::events::NodeEvents;

/// Entry function name used when a node type does not declare one.
pub const DEFAULT_ENTRY: &str = "execute";

/// Resolved call arguments, keyed by input name.
pub type Inputs = Map<String, Value>;

/// What a node produced for downstream consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    /// Zero-output sink. Not stored in the pass results.
    Empty,
    Scalar(Value),
    Sequence(Vec<Value>),
    Keyed(Map<String, Value>),
}

impl NodeOutput {
    pub fn is_empty(&self) -> bool {
        matches!(self, NodeOutput::Empty)
    }

    /// JSON view used for status snapshots and logging.
    pub fn to_value(&self) -> Value {
        match self {
            NodeOutput::Empty => Value::Null,
            NodeOutput::Scalar(v) => v.clone(),
            NodeOutput::Sequence(items) => Value::Array(items.clone()),
            NodeOutput::Keyed(map) => Value::Object(map.clone()),
        }
    }
}

impl From<Value> for NodeOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => NodeOutput::Empty,
            Value::Array(items) => NodeOutput::Sequence(items),
            Value::Object(map) => NodeOutput::Keyed(map),
            other => NodeOutput::Scalar(other),
        }
    }
}

/// Result of one node invocation.
///
/// `live_update` is UI-facing data attached to the `completed` event; it is
/// never fed to downstream nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReturn {
    pub outputs: NodeOutput,
    pub live_update: Option<Value>,
}

impl NodeReturn {
    pub fn new(outputs: NodeOutput) -> Self {
        Self {
            outputs,
            live_update: None,
        }
    }

    /// A single output value.
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::new(NodeOutput::Scalar(value.into()))
    }

    pub fn empty() -> Self {
        Self::new(NodeOutput::Empty)
    }

    pub fn with_live_update(mut self, data: Value) -> Self {
        self.live_update = Some(data);
        self
    }
}

impl From<NodeOutput> for NodeReturn {
    fn from(outputs: NodeOutput) -> Self {
        Self::new(outputs)
    }
}

/// A live node instance.
///
/// One instance exists per (workflow load, node id); it may keep private
/// state across iterations.
pub trait Node: Send {
    /// Whether this object exposes `function` as a callable entry point.
    fn has_entry(&self, function: &str) -> bool {
        function == DEFAULT_ENTRY
    }

    /// Invoke the entry point with resolved inputs.
    fn call(&mut self, function: &str, inputs: &Inputs) -> anyhow::Result<NodeReturn>;

    /// Check inputs before a call. The engine treats a failure as advisory
    /// unless strict validation is configured.
    fn validate_inputs(
        &self,
        schema: &InputSchema,
        inputs: &Inputs,
    ) -> Result<(), ValidationError> {
        schema.validate(inputs)
    }

    /// Receive the event handle bound to this node's id.
    fn attach_events(&mut self, _events: NodeEvents) {}
}

/// Typed accessors over [`Inputs`] for node implementations.
pub mod args {
    use anyhow::{Result, anyhow};
    use serde_json::Value;

    use super::Inputs;

    pub fn f64_or(inputs: &Inputs, name: &str, fallback: f64) -> Result<f64> {
        match inputs.get(name) {
            None | Some(Value::Null) => Ok(fallback),
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| anyhow!("input '{name}' is not representable as f64")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| anyhow!("input '{name}' = {s:?} is not a number: {e}")),
            Some(Value::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
            Some(other) => Err(anyhow!("input '{name}' is not a number: {other}")),
        }
    }

    pub fn f64(inputs: &Inputs, name: &str) -> Result<f64> {
        if !inputs.contains_key(name) {
            return Err(anyhow!("missing input '{name}'"));
        }
        f64_or(inputs, name, 0.0)
    }

    /// String view of an input; non-string scalars are rendered as JSON.
    pub fn text_or(inputs: &Inputs, name: &str, fallback: &str) -> String {
        match inputs.get(name) {
            None | Some(Value::Null) => fallback.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn bool_or(inputs: &Inputs, name: &str, fallback: bool) -> bool {
        match inputs.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => matches!(s.trim(), "true" | "1" | "yes"),
            _ => fallback,
        }
    }
}
