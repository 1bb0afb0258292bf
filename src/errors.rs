// src/errors.rs

//! Crate-wide error types.
//!
//! - [`GraphError`]: a submitted workflow cannot be turned into a plan.
//! - [`RegistryError`]: node registration / module discovery failures.
//! - [`FlowloopError`]: the top-level error returned by the engine surface.

use thiserror::Error;

/// Boxed error used to carry node failures across the engine boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structural problems with a submitted workflow graph.
///
/// These are surfaced immediately to the caller of `load_workflow` /
/// `run_once` and are never retried.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Workflow must contain a 'nodes' list")]
    MissingNodes,

    #[error("Workflow must contain an 'edges' list")]
    MissingEdges,

    #[error("Workflow contains no nodes")]
    EmptyGraph,

    #[error("Duplicate node id '{0}'")]
    DuplicateNodeId(String),

    #[error("Workflow contains cycles. Remaining nodes: {0:?}")]
    CyclicGraph(Vec<String>),

    #[error("Node '{0}' has no type specified")]
    MissingNodeType(String),

    #[error("Unknown node type '{type_name}' for node '{node_id}'")]
    UnknownNodeType { node_id: String, type_name: String },

    #[error("Node '{node_id}' does not have function '{function}'")]
    MissingFunction { node_id: String, function: String },

    #[error("Malformed workflow: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors raised by the node registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Node type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Node type '{0}' not found")]
    NotFound(String),

    #[error("Invalid node descriptor '{type_name}': {reason}")]
    InvalidDescriptor { type_name: String, reason: String },

    #[error("Unknown node library '{0}'")]
    UnknownLibrary(String),

    #[error("Library '{library}' has no node implementation '{implementation}'")]
    UnknownImplementation {
        library: String,
        implementation: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum FlowloopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Node '{node_id}' execution failed: {source}")]
    NodeExecution {
        node_id: String,
        #[source]
        source: BoxError,
    },

    #[error("Loop interval must be positive (got {0})")]
    InvalidInterval(f64),

    #[error("Cannot execute a single workflow while continuous execution is running")]
    AlreadyRunning,

    #[error("No workflow loaded")]
    NoWorkflow,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlowloopError {
    /// The id of the node that failed, for node execution errors.
    pub fn failed_node(&self) -> Option<&str> {
        match self {
            FlowloopError::NodeExecution { node_id, .. } => Some(node_id),
            _ => None,
        }
    }

    /// Render the full cause chain, one cause per line.
    ///
    /// Used as the `trace` of `workflowError` events.
    pub fn trace(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowloopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_walks_the_cause_chain() {
        let inner = anyhow::anyhow!("division by zero").context("math failed");
        let err = FlowloopError::NodeExecution {
            node_id: "math-1".to_string(),
            source: inner.into(),
        };

        let trace = err.trace();
        assert!(trace.starts_with("Node 'math-1' execution failed"));
        assert!(trace.contains("caused by"));
        assert_eq!(err.failed_node(), Some("math-1"));
    }

    #[test]
    fn cyclic_graph_lists_remaining_nodes() {
        let err = GraphError::CyclicGraph(vec!["a".into(), "b".into()]);
        assert!(err.to_string().contains("\"a\""));
        assert!(err.to_string().contains("\"b\""));
    }
}
