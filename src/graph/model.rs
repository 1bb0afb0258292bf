// src/graph/model.rs

//! JSON wire shape of a workflow.
//!
//! ```json
//! {
//!   "nodes": [{ "id": "a", "type": "MathNode", "data": { "parameters": { "b": 2 } } }],
//!   "edges": [{ "source": "a", "target": "b", "sourceHandle": "output", "targetHandle": "a" }]
//! }
//! ```
//!
//! Fields the engine does not understand (positions, styling, ...) are kept
//! verbatim so a graph round-trips unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::GraphError;
use crate::node::InputSchema;

pub const DEFAULT_SOURCE_HANDLE: &str = "output";
pub const DEFAULT_TARGET_HANDLE: &str = "input";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub nodes: Vec<NodePlacement>,
    pub edges: Vec<Edge>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowGraph {
    pub fn new(nodes: Vec<NodePlacement>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            extra: Map::new(),
        }
    }

    /// Parse a workflow document, reporting missing `nodes`/`edges` lists
    /// before any field-level errors.
    pub fn from_value(value: Value) -> Result<Self, GraphError> {
        let has_list = |key: &str| value.get(key).is_some_and(Value::is_array);
        if !has_list("nodes") {
            return Err(GraphError::MissingNodes);
        }
        if !has_list("edges") {
            return Err(GraphError::MissingEdges);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, GraphError> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn placement(&self, id: &str) -> Option<&NodePlacement> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A node instance placed in a workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePlacement {
    pub id: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<NodeData>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodePlacement {
    pub fn new(id: &str, node_type: &str) -> Self {
        Self {
            id: id.to_string(),
            node_type: Some(node_type.to_string()),
            ..Self::default()
        }
    }

    /// `type`, else `data.type`, else `data.nodeInfo.name`.
    pub fn type_name(&self) -> Option<&str> {
        self.node_type
            .as_deref()
            .or_else(|| self.data.as_ref().and_then(|d| d.node_type.as_deref()))
            .or_else(|| {
                self.node_info()
                    .and_then(|info| info.get("name"))
                    .and_then(Value::as_str)
            })
    }

    pub fn parameters(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref().and_then(|d| d.parameters.as_ref())
    }

    /// The embedded `data.nodeInfo`, exactly as submitted.
    pub fn node_info(&self) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.node_info.as_ref())
    }

    /// `nodeInfo.input_types` parsed as a schema. `None` when absent or null.
    pub fn embedded_input_types(&self) -> Option<Result<InputSchema, serde_json::Error>> {
        let raw = self.node_info()?.get("input_types").filter(|v| !v.is_null())?;
        Some(InputSchema::deserialize(raw))
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.data
            .get_or_insert_with(NodeData::default)
            .parameters
            .get_or_insert_with(Map::new)
            .insert(name.to_string(), value.into());
        self
    }

    pub fn with_node_info(mut self, info: Value) -> Self {
        self.data.get_or_insert_with(NodeData::default).node_info = Some(info);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,

    /// Kept verbatim; only `name` and `input_types` are ever read from it.
    #[serde(rename = "nodeInfo", default, skip_serializing_if = "Option::is_none")]
    pub node_info: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A connection from one node's output handle to another node's input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub source: String,
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            ..Self::default()
        }
    }

    pub fn with_handles(mut self, source_handle: &str, target_handle: &str) -> Self {
        self.source_handle = Some(source_handle.to_string());
        self.target_handle = Some(target_handle.to_string());
        self
    }

    pub fn output_handle(&self) -> &str {
        self.source_handle.as_deref().unwrap_or(DEFAULT_SOURCE_HANDLE)
    }

    pub fn input_handle(&self) -> &str {
        self.target_handle.as_deref().unwrap_or(DEFAULT_TARGET_HANDLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_missing_lists() {
        assert!(matches!(
            WorkflowGraph::from_value(json!({"edges": []})),
            Err(GraphError::MissingNodes)
        ));
        assert!(matches!(
            WorkflowGraph::from_value(json!({"nodes": []})),
            Err(GraphError::MissingEdges)
        ));
        assert!(matches!(
            WorkflowGraph::from_value(json!({"nodes": [{"no_id": 1}], "edges": []})),
            Err(GraphError::Malformed(_))
        ));
    }

    #[test]
    fn preserves_unknown_fields() {
        let doc = json!({
            "nodes": [{
                "id": "a",
                "position": {"x": 10, "y": 20},
                "data": {"type": "MathNode", "label": "A", "parameters": {"b": 2}}
            }],
            "edges": [{"id": "e1", "source": "a", "target": "a", "animated": true}],
            "viewport": {"zoom": 1.5}
        });

        let graph = WorkflowGraph::from_value(doc.clone()).unwrap();
        assert_eq!(graph.nodes[0].type_name(), Some("MathNode"));
        assert_eq!(graph.to_value(), doc);
    }

    #[test]
    fn type_name_falls_back_to_node_info() {
        let placement: NodePlacement = serde_json::from_value(json!({
            "id": "x",
            "data": {"nodeInfo": {"name": "InputNode"}}
        }))
        .unwrap();
        assert_eq!(placement.type_name(), Some("InputNode"));

        let bare = NodePlacement {
            id: "y".into(),
            ..NodePlacement::default()
        };
        assert_eq!(bare.type_name(), None);
    }

    #[test]
    fn embedded_node_info_round_trips_verbatim() {
        let doc = json!({
            "nodes": [{
                "id": "cam",
                "type": "CameraNode",
                "data": {
                    "parameters": {"fps": 30},
                    "nodeInfo": {
                        "name": "CameraNode",
                        "input_types": {
                            "required": {
                                "fps": ["INT", {"default": 30, "min": 1, "max": 120}],
                                "text": ["STRING"]
                            }
                        },
                        "return_types": ["IMAGE"],
                        "ui": {"color": "#123"}
                    }
                }
            }],
            "edges": []
        });

        let graph = WorkflowGraph::from_value(doc.clone()).unwrap();
        assert_eq!(graph.to_value(), doc);

        let schema = graph.nodes[0].embedded_input_types().unwrap().unwrap();
        let fps = schema.get("fps").unwrap();
        assert_eq!(fps.default_value(), Some(&json!(30)));
        assert_eq!(fps.options.max, Some(120.0));
        assert!(schema.get("text").is_some());
    }

    #[test]
    fn odd_node_info_does_not_reject_the_graph() {
        let doc = json!({
            "nodes": [{"id": "a", "type": "InputNode", "data": {"nodeInfo": {"input_types": "n/a"}}}],
            "edges": []
        });
        let graph = WorkflowGraph::from_value(doc.clone()).unwrap();
        assert!(graph.nodes[0].embedded_input_types().unwrap().is_err());
        assert_eq!(graph.to_value(), doc);
    }

    #[test]
    fn edge_handles_default() {
        let edge = Edge::new("a", "b");
        assert_eq!(edge.output_handle(), "output");
        assert_eq!(edge.input_handle(), "input");
    }
}
