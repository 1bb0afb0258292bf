// src/engine/resolver.rs

//! Per-node input resolution.
//!
//! Precedence, last applied wins:
//! 1. values arriving over edges,
//! 2. the placement's parameters,
//! 3. schema defaults, for inputs still absent.
//!
//! Resolution never fails: an input nothing provides stays absent.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::graph::Edge;
use crate::node::{InputSchema, Inputs, NodeOutput};

/// Outputs of one pass, keyed by node id. Zero-output nodes have no entry.
pub type ExecutionResults = BTreeMap<String, NodeOutput>;

/// Pick the value an edge carries out of an upstream node's output.
///
/// Returns `None` when the edge contributes nothing.
pub fn select_output(output: &NodeOutput, handle: &str) -> Option<Value> {
    match output {
        NodeOutput::Empty => None,
        NodeOutput::Sequence(items) => {
            if let Some(index) = output_index(handle) {
                return items.get(index).cloned();
            }
            Some(items.first().cloned().unwrap_or(Value::Null))
        }
        NodeOutput::Keyed(map) => Some(select_key(map, handle)),
        NodeOutput::Scalar(Value::Object(map)) => Some(select_key(map, handle)),
        NodeOutput::Scalar(value) => Some(value.clone()),
    }
}

fn select_key(map: &Map<String, Value>, handle: &str) -> Value {
    map.get(handle)
        .cloned()
        .unwrap_or_else(|| Value::Object(map.clone()))
}

/// `output-<N>` → `N`.
fn output_index(handle: &str) -> Option<usize> {
    handle.strip_prefix("output-")?.parse().ok()
}

/// Compute the call arguments for one node.
pub fn resolve_inputs(
    incoming: &[Edge],
    results: &ExecutionResults,
    parameters: &Map<String, Value>,
    schema: &InputSchema,
) -> Inputs {
    let mut inputs = Inputs::new();

    for edge in incoming {
        let Some(upstream) = results.get(&edge.source) else {
            continue;
        };
        if let Some(value) = select_output(upstream, edge.output_handle()) {
            inputs.insert(edge.input_handle().to_string(), value);
        }
    }

    for (name, value) in parameters {
        inputs.insert(name.clone(), value.clone());
    }

    for (name, spec) in schema.iter() {
        if inputs.contains_key(name) {
            continue;
        }
        if let Some(default) = spec.default_value() {
            inputs.insert(name.clone(), default.clone());
        }
    }

    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::InputSpec;
    use serde_json::json;

    fn keyed(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn sequence_selection_rules() {
        let seq = NodeOutput::Sequence(vec![json!("a"), json!("b")]);
        assert_eq!(select_output(&seq, "output-1"), Some(json!("b")));
        assert_eq!(select_output(&seq, "output-5"), None);
        assert_eq!(select_output(&seq, "output"), Some(json!("a")));

        let single = NodeOutput::Sequence(vec![json!(7)]);
        assert_eq!(select_output(&single, "whatever"), Some(json!(7)));

        let empty = NodeOutput::Sequence(vec![]);
        assert_eq!(select_output(&empty, "output"), Some(Value::Null));
    }

    #[test]
    fn keyed_selection_rules() {
        let map = NodeOutput::Keyed(keyed(json!({"left": 1, "right": 2})));
        assert_eq!(select_output(&map, "right"), Some(json!(2)));
        assert_eq!(
            select_output(&map, "output"),
            Some(json!({"left": 1, "right": 2}))
        );

        let object_scalar = NodeOutput::Scalar(json!({"x": 1}));
        assert_eq!(select_output(&object_scalar, "x"), Some(json!(1)));
        assert_eq!(select_output(&NodeOutput::Scalar(json!(3)), "x"), Some(json!(3)));
        assert_eq!(select_output(&NodeOutput::Empty, "output"), None);
    }

    #[test]
    fn parameters_override_edges_and_defaults_fill_gaps() {
        let edge = Edge::new("up", "me").with_handles("output", "p");
        let mut results = ExecutionResults::new();
        results.insert("up".into(), NodeOutput::Scalar(json!(1)));

        let params = keyed(json!({"p": 5}));
        let mut schema = InputSchema::default();
        schema
            .required
            .insert("p".into(), InputSpec::new("INT").with_default(0));
        schema
            .optional
            .insert("q".into(), InputSpec::new("INT").with_default(9));
        schema.required.insert("r".into(), InputSpec::new("INT"));

        let inputs = resolve_inputs(&[edge], &results, &params, &schema);
        assert_eq!(inputs.get("p"), Some(&json!(5)));
        assert_eq!(inputs.get("q"), Some(&json!(9)));
        assert!(!inputs.contains_key("r"));
    }

    #[test]
    fn upstream_without_result_contributes_nothing() {
        let edge = Edge::new("sink", "me");
        let inputs = resolve_inputs(
            &[edge],
            &ExecutionResults::new(),
            &Map::new(),
            &InputSchema::default(),
        );
        assert!(inputs.is_empty());
    }
}
