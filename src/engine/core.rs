// src/engine/core.rs

//! Shared engine state.
//!
//! [`EngineCore`] is owned behind an `Arc` by both the caller-facing
//! [`Engine`](super::Engine) and the continuous worker thread. All mutable
//! state sits behind short-lived `parking_lot` locks; a pass only ever holds
//! an `Arc` snapshot of the plan, never the state lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde_json::Value;

use super::executor::{PassExecutor, PassFailure};
use super::plan::ExecutionPlan;
use super::resolver::ExecutionResults;
use super::status::{EngineStatus, RunLog, STATUS_LOG_TAIL, Severity};
use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::errors::{FlowloopError, Result};
use crate::events::{EngineEvent, EventSink};
use crate::graph::WorkflowGraph;
use crate::node::NodeRegistry;

/// Running flag plus the condvar the worker sleeps on.
///
/// Each `try_start` opens a new generation, so a worker that outlived its
/// `stop` cannot mistake a later run for its own.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    state: Mutex<SignalState>,
    wake: Condvar,
}

#[derive(Debug, Default)]
struct SignalState {
    running: bool,
    generation: u64,
}

impl StopSignal {
    /// Flip to running. Returns the new generation, or `None` if already
    /// running.
    pub(crate) fn try_start(&self) -> Option<u64> {
        let mut state = self.state.lock();
        if state.running {
            return None;
        }
        state.running = true;
        state.generation += 1;
        Some(state.generation)
    }

    /// Flip to idle. With `Some(generation)`, only if that run is current.
    /// Returns whether anything was stopped.
    pub(crate) fn stop(&self, generation: Option<u64>) -> bool {
        let mut state = self.state.lock();
        let matches = generation.is_none_or(|g| g == state.generation);
        if !state.running || !matches {
            return false;
        }
        state.running = false;
        self.wake.notify_all();
        true
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        let state = self.state.lock();
        state.running && state.generation == generation
    }

    /// Sleep up to `duration`, waking early on `stop`. Returns whether the
    /// run is still current afterwards.
    pub(crate) fn sleep(&self, generation: u64, duration: Duration) -> bool {
        let mut state = self.state.lock();
        if !(state.running && state.generation == generation) {
            return false;
        }
        self.wake.wait_while_for(
            &mut state,
            |s| s.running && s.generation == generation,
            duration,
        );
        state.running && state.generation == generation
    }
}

/// Seconds as a `Duration`, saturating at `Duration::MAX` for values too
/// large to represent.
pub(crate) fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

#[derive(Debug)]
struct RunState {
    workflow: Option<WorkflowGraph>,
    plan: Option<Arc<ExecutionPlan>>,
    next_workflow_id: u64,
    iteration_count: u64,
    last_duration: f64,
    interval: f64,
    last_results: ExecutionResults,
    log: RunLog,
}

pub(crate) struct EngineCore {
    registry: Arc<NodeRegistry>,
    pub(crate) sink: Arc<dyn EventSink>,
    cache: Mutex<Box<dyn ResultCache>>,
    strict_validation: bool,
    pub(crate) signal: StopSignal,
    state: Mutex<RunState>,
}

impl std::fmt::Debug for EngineCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCore")
            .field("registry", &self.registry)
            .field("strict_validation", &self.strict_validation)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

impl EngineCore {
    pub(crate) fn new(
        registry: Arc<NodeRegistry>,
        sink: Arc<dyn EventSink>,
        cache: Box<dyn ResultCache>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            cache: Mutex::new(cache),
            strict_validation: config.engine.strict_validation,
            signal: StopSignal::default(),
            state: Mutex::new(RunState {
                workflow: None,
                plan: None,
                next_workflow_id: 1,
                iteration_count: 0,
                last_duration: 0.0,
                interval: config.engine.interval_seconds,
                last_results: ExecutionResults::new(),
                log: RunLog::new(config.engine.log_capacity),
            }),
        }
    }

    pub(crate) fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub(crate) fn record(&self, level: Severity, message: impl Into<String>) {
        self.state.lock().log.record(level, message);
    }

    /// Replace the current workflow and build its plan.
    ///
    /// On failure the engine is left without a workflow.
    pub(crate) fn load(&self, graph: WorkflowGraph) -> Result<Arc<ExecutionPlan>> {
        let workflow_id = {
            let mut state = self.state.lock();
            let id = state.next_workflow_id;
            state.next_workflow_id += 1;
            id
        };

        match ExecutionPlan::build(workflow_id, &graph, &self.registry, &self.sink) {
            Ok(plan) => {
                let plan = Arc::new(plan);
                self.cache.lock().clear();
                let mut state = self.state.lock();
                let message = format!(
                    "Loaded workflow with {} nodes and {} edges",
                    graph.nodes.len(),
                    graph.edges.len()
                );
                state.workflow = Some(graph);
                state.plan = Some(Arc::clone(&plan));
                state.log.record(Severity::Info, message);
                Ok(plan)
            }
            Err(e) => {
                let mut state = self.state.lock();
                state.workflow = None;
                state.plan = None;
                state
                    .log
                    .record(Severity::Error, format!("Failed to load workflow: {e}"));
                Err(e.into())
            }
        }
    }

    /// The current plan, building it from the loaded workflow if needed.
    pub(crate) fn ensure_plan(&self) -> Result<Arc<ExecutionPlan>> {
        let workflow = {
            let state = self.state.lock();
            if let Some(plan) = &state.plan {
                return Ok(Arc::clone(plan));
            }
            state.workflow.clone().ok_or(FlowloopError::NoWorkflow)?
        };
        self.load(workflow)
    }

    pub(crate) fn current_plan(&self) -> Option<Arc<ExecutionPlan>> {
        self.state.lock().plan.clone()
    }

    pub(crate) fn has_workflow(&self) -> bool {
        self.state.lock().workflow.is_some()
    }

    /// Run one pass over `plan`, recording its results. Returns the pass
    /// duration in seconds.
    pub(crate) fn run_pass(
        &self,
        plan: &ExecutionPlan,
    ) -> std::result::Result<(ExecutionResults, f64), PassFailure> {
        let started = Instant::now();
        let results =
            PassExecutor::new(plan, &self.sink, &self.cache, self.strict_validation).run()?;
        let duration = started.elapsed().as_secs_f64();
        self.state.lock().last_results = results.clone();
        Ok((results, duration))
    }

    /// Reset counters for a new continuous run.
    pub(crate) fn begin_run(&self) {
        let mut state = self.state.lock();
        state.iteration_count = 0;
        state.log.record(Severity::Info, "Started continuous execution");
    }

    /// Count a completed iteration. Returns the new count.
    pub(crate) fn finish_iteration(&self, duration: f64) -> u64 {
        let mut state = self.state.lock();
        state.iteration_count += 1;
        state.last_duration = duration;
        state.iteration_count
    }

    pub(crate) fn iteration_count(&self) -> u64 {
        self.state.lock().iteration_count
    }

    pub(crate) fn interval(&self) -> Duration {
        seconds_to_duration(self.state.lock().interval)
    }

    pub(crate) fn set_interval(&self, seconds: f64) -> Result<()> {
        let representable = Duration::try_from_secs_f64(seconds).is_ok();
        if !seconds.is_finite() || seconds <= 0.0 || !representable {
            return Err(FlowloopError::InvalidInterval(seconds));
        }
        let mut state = self.state.lock();
        state.interval = seconds;
        state
            .log
            .record(Severity::Info, format!("Set loop interval to {seconds} seconds"));
        Ok(())
    }

    /// Flip the running flag off and announce it.
    ///
    /// `generation` restricts the stop to one specific run (used by the
    /// worker when a pass fails).
    pub(crate) fn request_stop(&self, generation: Option<u64>) -> bool {
        if !self.signal.stop(generation) {
            if generation.is_none() {
                self.record(Severity::Warn, "Continuous execution is not running");
            }
            return false;
        }

        let (workflow_id, total_iterations) = {
            let state = self.state.lock();
            (
                state.plan.as_ref().map(|p| p.workflow_id).unwrap_or_default(),
                state.iteration_count,
            )
        };
        self.sink.publish(EngineEvent::LoopStopped {
            workflow_id,
            total_iterations,
        });
        self.record(Severity::Info, "Stopped continuous execution");
        true
    }

    pub(crate) fn update_parameter(&self, node_id: &str, name: &str, value: Value) -> bool {
        let Some(plan) = self.current_plan() else {
            self.record(
                Severity::Warn,
                format!("No plan built; parameter update for node {node_id} ignored"),
            );
            return false;
        };

        if plan.update_parameter(node_id, name, value) {
            self.record(
                Severity::Info,
                format!("Updated node {node_id} parameter {name}"),
            );
            true
        } else {
            self.record(
                Severity::Warn,
                format!("Node {node_id} not found in plan; parameter update ignored"),
            );
            false
        }
    }

    /// Release the plan and its node instances. The workflow stays loaded
    /// and is rebuilt on the next `start`.
    pub(crate) fn drop_plan(&self) {
        self.state.lock().plan = None;
        self.cache.lock().clear();
    }

    pub(crate) fn status(&self) -> EngineStatus {
        let running = self.signal.is_running();
        let state = self.state.lock();
        EngineStatus {
            running,
            has_workflow: state.workflow.is_some(),
            iteration_count: state.iteration_count,
            last_duration_seconds: state.last_duration,
            interval_seconds: state.interval,
            last_results: state
                .last_results
                .iter()
                .map(|(id, out)| (id.clone(), out.to_value()))
                .collect(),
            recent_logs: state.log.recent(STATUS_LOG_TAIL),
            plan_ready: state.plan.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_generations_isolate_runs() {
        let signal = StopSignal::default();
        let first = signal.try_start().unwrap();
        assert!(signal.try_start().is_none());
        assert!(signal.stop(None));
        assert!(!signal.stop(None));

        let second = signal.try_start().unwrap();
        assert_ne!(first, second);
        assert!(!signal.is_current(first));
        assert!(!signal.stop(Some(first)));
        assert!(signal.is_running());
        assert!(signal.stop(Some(second)));
    }

    #[test]
    fn sleep_wakes_on_stop() {
        let signal = Arc::new(StopSignal::default());
        let generation = signal.try_start().unwrap();

        let stopper = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                signal.stop(None);
            })
        };

        let started = Instant::now();
        assert!(!signal.sleep(generation, Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();
    }
}
