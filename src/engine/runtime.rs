// src/engine/runtime.rs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::core::{EngineCore, seconds_to_duration};
use super::resolver::ExecutionResults;
use super::scheduler::ContinuousScheduler;
use super::status::{EngineStatus, Severity};
use crate::cache::cache_for_mode;
use crate::config::EngineConfig;
use crate::errors::{FlowloopError, Result};
use crate::events::{EngineEvent, EventSink};
use crate::graph::WorkflowGraph;
use crate::node::NodeRegistry;

/// Outcome of [`Engine::run_once`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_node: Option<String>,
    /// On failure, the outputs computed before the failing node.
    pub results: BTreeMap<String, Value>,
    pub duration_seconds: f64,
}

fn results_to_values(results: &ExecutionResults) -> BTreeMap<String, Value> {
    results
        .iter()
        .map(|(id, out)| (id.clone(), out.to_value()))
        .collect()
}

/// The engine's administrative surface.
///
/// Owns the shared core and the continuous scheduler. Dropping the engine
/// stops a running loop.
#[derive(Debug)]
pub struct Engine {
    core: Arc<EngineCore>,
    scheduler: ContinuousScheduler,
}

impl Engine {
    pub fn new(
        registry: Arc<NodeRegistry>,
        sink: Arc<dyn EventSink>,
        config: &EngineConfig,
    ) -> Self {
        let cache = cache_for_mode(config.cache.mode);
        info!(
            cache = cache.name(),
            interval = config.engine.interval_seconds,
            strict_validation = config.engine.strict_validation,
            "engine created"
        );
        Self {
            core: Arc::new(EngineCore::new(registry, sink, cache, config)),
            scheduler: ContinuousScheduler::new(seconds_to_duration(
                config.engine.join_timeout_seconds,
            )),
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        self.core.registry()
    }

    /// Load `graph`, replacing any current workflow, and build its plan.
    ///
    /// A running loop picks the new plan up on its next iteration.
    pub fn load_workflow(&self, graph: WorkflowGraph) -> Result<()> {
        self.core.load(graph).map(|_| ())
    }

    /// [`load_workflow`](Self::load_workflow) reporting success as a bool.
    pub fn try_load_workflow(&self, graph: WorkflowGraph) -> bool {
        self.load_workflow(graph).is_ok()
    }

    /// Load `graph` and run it once on the calling thread.
    ///
    /// Graph errors are returned as `Err`; a failing node yields a report
    /// with `success == false`.
    pub fn run_once(&self, graph: WorkflowGraph) -> Result<RunReport> {
        if self.core.signal.is_running() {
            return Err(FlowloopError::AlreadyRunning);
        }

        let plan = self.core.load(graph)?;
        self.core.sink.publish(EngineEvent::WorkflowStarted {
            workflow_id: plan.workflow_id,
            node_count: plan.len(),
        });

        let started = Instant::now();
        match self.core.run_pass(&plan) {
            Ok((results, duration)) => {
                self.core.sink.publish(EngineEvent::WorkflowCompleted {
                    workflow_id: plan.workflow_id,
                    duration_seconds: duration,
                });
                Ok(RunReport {
                    success: true,
                    error: None,
                    failed_node: None,
                    results: results_to_values(&results),
                    duration_seconds: duration,
                })
            }
            Err(failure) => {
                let error = failure.error;
                self.core.record(
                    Severity::Error,
                    format!("Single workflow execution failed: {error}"),
                );
                self.core.sink.publish(EngineEvent::WorkflowError {
                    workflow_id: Some(plan.workflow_id),
                    message: error.to_string(),
                    trace: error.trace(),
                });
                Ok(RunReport {
                    success: false,
                    error: Some(error.to_string()),
                    failed_node: error.failed_node().map(str::to_string),
                    results: results_to_values(&failure.partial),
                    duration_seconds: started.elapsed().as_secs_f64(),
                })
            }
        }
    }

    /// Start the continuous loop. `Ok(false)` if it was already running or
    /// no workflow is loaded.
    pub fn start(&self) -> Result<bool> {
        self.scheduler.start(&self.core)
    }

    /// Stop the continuous loop, waiting (bounded) for the worker to exit.
    /// Returns false if it was not running.
    pub fn stop(&self) -> bool {
        self.scheduler.stop(&self.core, true)
    }

    pub fn is_running(&self) -> bool {
        self.core.signal.is_running()
    }

    pub fn has_workflow(&self) -> bool {
        self.core.has_workflow()
    }

    /// Change the sleep between iterations. Applies from the next sleep.
    pub fn set_interval(&self, seconds: f64) -> Result<()> {
        self.core.set_interval(seconds)
    }

    /// Set a live parameter on a node of the current plan.
    ///
    /// Returns false if there is no plan or the node is not in it. The new
    /// value may already be seen by the pass in flight.
    pub fn update_node_parameter(&self, node_id: &str, name: &str, value: Value) -> bool {
        self.core.update_parameter(node_id, name, value)
    }

    pub fn status(&self) -> EngineStatus {
        self.core.status()
    }

    /// Stop the loop and release the plan.
    pub fn shutdown(&self) {
        if self.is_running() {
            self.stop();
        }
        self.core.drop_plan();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.core.signal.is_running() {
            self.scheduler.stop(&self.core, true);
        }
    }
}
