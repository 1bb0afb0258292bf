// src/engine/executor.rs

//! One full pass over an execution plan.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, warn};

use super::plan::{ExecutionPlan, PlanNode};
use super::resolver::{ExecutionResults, resolve_inputs};
use crate::cache::ResultCache;
use crate::errors::FlowloopError;
use crate::events::{EngineEvent, EventSink, NodeStatus};
use crate::node::{Inputs, Node, NodeReturn};

/// A failed pass: the error plus whatever completed before it.
#[derive(Debug)]
pub struct PassFailure {
    pub error: FlowloopError,
    pub partial: ExecutionResults,
}

/// Runs every node of a plan once, in plan order.
pub struct PassExecutor<'a> {
    plan: &'a ExecutionPlan,
    sink: &'a Arc<dyn EventSink>,
    cache: &'a Mutex<Box<dyn ResultCache>>,
    strict_validation: bool,
}

impl<'a> PassExecutor<'a> {
    pub fn new(
        plan: &'a ExecutionPlan,
        sink: &'a Arc<dyn EventSink>,
        cache: &'a Mutex<Box<dyn ResultCache>>,
        strict_validation: bool,
    ) -> Self {
        Self {
            plan,
            sink,
            cache,
            strict_validation,
        }
    }

    /// Execute the pass. Stops at the first failing node.
    pub fn run(&self) -> Result<ExecutionResults, PassFailure> {
        let mut results = ExecutionResults::new();

        for id in self.plan.order() {
            let Some(node) = self.plan.node(id) else {
                continue;
            };

            self.sink
                .publish(EngineEvent::node_state(id, NodeStatus::Executing, None));

            match self.run_node(node, &results) {
                Ok(ret) => {
                    self.sink.publish(EngineEvent::node_state(
                        id,
                        NodeStatus::Completed,
                        Some(json!({ "liveUpdate": ret.live_update })),
                    ));
                    if !ret.outputs.is_empty() {
                        results.insert(id.clone(), ret.outputs);
                    }
                }
                Err(error) => {
                    warn!(node = %id, error = %error, "node execution failed");
                    self.sink.publish(EngineEvent::node_state(
                        id,
                        NodeStatus::Error,
                        Some(json!({ "message": error.to_string() })),
                    ));
                    return Err(PassFailure {
                        error,
                        partial: results,
                    });
                }
            }
        }

        Ok(results)
    }

    fn run_node(
        &self,
        node: &PlanNode,
        results: &ExecutionResults,
    ) -> Result<NodeReturn, FlowloopError> {
        let inputs = resolve_inputs(
            self.plan.incoming(&node.id),
            results,
            &node.parameters(),
            &node.schema,
        );

        let mut instance = node.instance.lock();

        if let Err(e) = instance.validate_inputs(&node.schema, &inputs) {
            if self.strict_validation {
                return Err(node_error(&node.id, anyhow!(e)));
            }
            debug!(node = %node.id, error = %e, "input validation failed; continuing");
        }

        if let Some(hit) = self.cache.lock().get(&node.id, &inputs) {
            debug!(node = %node.id, "using cached result");
            return Ok(hit);
        }

        let ret = invoke(instance.as_mut(), &node.function, &inputs)
            .map_err(|e| node_error(&node.id, e))?;

        self.cache.lock().put(&node.id, &inputs, &ret);
        Ok(ret)
    }
}

/// Call the node, turning a panic into an error.
fn invoke(
    node: &mut dyn Node,
    function: &str,
    inputs: &Inputs,
) -> anyhow::Result<NodeReturn> {
    match panic::catch_unwind(AssertUnwindSafe(|| node.call(function, inputs))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow!("node panicked: {message}"))
        }
    }
}

fn node_error(node_id: &str, error: anyhow::Error) -> FlowloopError {
    FlowloopError::NodeExecution {
        node_id: node_id.to_string(),
        source: error.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ContentAddressedCache, NoopCache};
    use crate::events::NoopSink;
    use crate::graph::{Edge, NodePlacement, WorkflowGraph};
    use crate::node::{NodeOutput, NodeRegistry};
    use crate::types::DuplicatePolicy;

    fn plan(graph: &WorkflowGraph) -> ExecutionPlan {
        let registry = NodeRegistry::with_builtins(DuplicatePolicy::Warn);
        ExecutionPlan::build(1, graph, &registry, &(Arc::new(NoopSink) as Arc<dyn EventSink>))
            .unwrap()
    }

    #[test]
    fn chains_math_nodes() {
        let graph = WorkflowGraph::new(
            vec![
                NodePlacement::new("a", "MathNode")
                    .with_parameter("a", 2)
                    .with_parameter("b", 3),
                NodePlacement::new("b", "MathNode")
                    .with_parameter("b", 10)
                    .with_parameter("operation", "multiply"),
            ],
            vec![Edge::new("a", "b").with_handles("output", "a")],
        );
        let plan = plan(&graph);
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        let cache: Mutex<Box<dyn ResultCache>> = Mutex::new(Box::new(NoopCache));

        let results = PassExecutor::new(&plan, &sink, &cache, false).run().unwrap();
        assert_eq!(results["a"], NodeOutput::Scalar(json!(5.0)));
        assert_eq!(results["b"], NodeOutput::Scalar(json!(50.0)));
    }

    #[test]
    fn failure_keeps_partial_results() {
        let graph = WorkflowGraph::new(
            vec![
                NodePlacement::new("ok", "MathNode").with_parameter("a", 1),
                NodePlacement::new("bad", "MathNode").with_parameter("operation", "divide"),
            ],
            vec![],
        );
        let plan = plan(&graph);
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        let cache: Mutex<Box<dyn ResultCache>> = Mutex::new(Box::new(NoopCache));

        let failure = PassExecutor::new(&plan, &sink, &cache, false)
            .run()
            .unwrap_err();
        assert_eq!(failure.error.failed_node(), Some("bad"));
        assert!(failure.partial.contains_key("ok"));
    }

    #[test]
    fn strict_validation_blocks_invalid_inputs() {
        let graph = WorkflowGraph::new(
            vec![NodePlacement::new("d", "DelayNode").with_parameter("delay_seconds", 50.0)],
            vec![],
        );
        let plan = plan(&graph);
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        let cache: Mutex<Box<dyn ResultCache>> = Mutex::new(Box::new(NoopCache));

        let failure = PassExecutor::new(&plan, &sink, &cache, true)
            .run()
            .unwrap_err();
        assert_eq!(failure.error.failed_node(), Some("d"));
    }

    #[test]
    fn content_cache_skips_repeat_calls() {
        let graph = WorkflowGraph::new(vec![NodePlacement::new("c", "CounterNode")], vec![]);
        let plan = plan(&graph);
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        let cache: Mutex<Box<dyn ResultCache>> =
            Mutex::new(Box::new(ContentAddressedCache::new()));

        let executor = PassExecutor::new(&plan, &sink, &cache, false);
        executor.run().unwrap();
        let second = executor.run().unwrap();
        assert_eq!(second["c"], NodeOutput::Scalar(json!(1)));
    }
}
