// src/engine/scheduler.rs

//! Continuous execution: one background worker running passes on a timer.
//!
//! Idle → Running on `start`, Running → Idle on `stop` or on the first
//! failed pass.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::core::EngineCore;
use super::status::Severity;
use crate::errors::{FlowloopError, Result};
use crate::events::EngineEvent;

pub const WORKER_THREAD_NAME: &str = "flowloop-loop";

/// Iterations between periodic stats log lines.
const STATS_EVERY: u64 = 10;

struct Worker {
    handle: JoinHandle<()>,
    thread_id: ThreadId,
    /// Disconnects when the worker thread exits.
    done: mpsc::Receiver<()>,
}

pub(crate) struct ContinuousScheduler {
    worker: Mutex<Option<Worker>>,
    join_timeout: Duration,
}

impl std::fmt::Debug for ContinuousScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContinuousScheduler")
            .field("has_worker", &self.worker.lock().is_some())
            .field("join_timeout", &self.join_timeout)
            .finish()
    }
}

impl ContinuousScheduler {
    pub(crate) fn new(join_timeout: Duration) -> Self {
        Self {
            worker: Mutex::new(None),
            join_timeout,
        }
    }

    /// Launch the loop. Returns `Ok(false)` (with a warning) if it is already
    /// running or no workflow is loaded.
    pub(crate) fn start(&self, core: &Arc<EngineCore>) -> Result<bool> {
        if core.signal.is_running() {
            core.record(Severity::Warn, "Continuous execution is already running");
            return Ok(false);
        }

        match core.ensure_plan() {
            Ok(_) => {}
            Err(FlowloopError::NoWorkflow) => {
                core.record(
                    Severity::Error,
                    "No workflow loaded. Cannot start execution.",
                );
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let mut slot = self.worker.lock();
        if let Some(previous) = slot.take() {
            if let Some(unfinished) = self.reap(previous) {
                *slot = Some(unfinished);
                core.record(
                    Severity::Warn,
                    "Previous worker has not exited yet; not starting a second one",
                );
                return Ok(false);
            }
        }

        let Some(generation) = core.signal.try_start() else {
            core.record(Severity::Warn, "Continuous execution is already running");
            return Ok(false);
        };
        core.begin_run();

        let (done_tx, done) = mpsc::channel::<()>();
        let worker_core = Arc::clone(core);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                run_loop(&worker_core, generation);
                drop(done_tx);
            });

        match spawned {
            Ok(handle) => {
                let thread_id = handle.thread().id();
                *slot = Some(Worker {
                    handle,
                    thread_id,
                    done,
                });
                Ok(true)
            }
            Err(e) => {
                core.signal.stop(Some(generation));
                core.record(
                    Severity::Error,
                    format!("Failed to spawn worker thread: {e}"),
                );
                Err(e.into())
            }
        }
    }

    /// Stop the loop and, if `join`, wait (bounded) for the worker to exit.
    ///
    /// Never joins when called from the worker itself.
    pub(crate) fn stop(&self, core: &EngineCore, join: bool) -> bool {
        if !core.request_stop(None) {
            return false;
        }
        if !join {
            return true;
        }

        let mut slot = self.worker.lock();
        if let Some(worker) = slot.take() {
            if worker.thread_id == thread::current().id() {
                *slot = Some(worker);
                return true;
            }
            if let Some(unfinished) = self.reap(worker) {
                warn!(
                    timeout = ?self.join_timeout,
                    "worker did not exit within the join timeout"
                );
                *slot = Some(unfinished);
            }
        }
        true
    }

    /// Join `worker` if it exits within the join timeout; otherwise hand it
    /// back.
    fn reap(&self, worker: Worker) -> Option<Worker> {
        match worker.done.recv_timeout(self.join_timeout) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if worker.handle.join().is_err() {
                    warn!("worker thread panicked");
                }
                debug!("worker thread joined");
                None
            }
            Err(RecvTimeoutError::Timeout) => Some(worker),
        }
    }
}

/// Body of the worker thread.
fn run_loop(core: &EngineCore, generation: u64) {
    core.record(Severity::Info, "Continuous execution loop started");

    if let Some(plan) = core.current_plan() {
        core.sink.publish(EngineEvent::LoopStarted {
            workflow_id: plan.workflow_id,
            node_count: plan.len(),
        });
    }

    while core.signal.is_current(generation) {
        let iteration_number = core.iteration_count() + 1;
        core.sink
            .publish(EngineEvent::IterationStarting { iteration_number });

        // Re-fetched every iteration so a workflow loaded mid-run is picked up.
        let outcome = core
            .ensure_plan()
            .map_err(|error| (None, error))
            .and_then(|plan| {
                core.run_pass(&plan)
                    .map_err(|failure| (Some(plan.workflow_id), failure.error))
            });

        match outcome {
            Ok((_, duration)) => {
                let count = core.finish_iteration(duration);
                core.sink.publish(EngineEvent::IterationCompleted {
                    iteration_number: count,
                    duration_seconds: duration,
                });
                if count % STATS_EVERY == 0 {
                    core.record(
                        Severity::Info,
                        format!(
                            "Completed {count} executions. Last execution took {duration:.3}s"
                        ),
                    );
                }
            }
            Err((workflow_id, error)) => {
                core.record(
                    Severity::Error,
                    format!("Error in execution loop: {error}"),
                );
                core.sink.publish(EngineEvent::WorkflowError {
                    workflow_id,
                    message: error.to_string(),
                    trace: error.trace(),
                });
                core.request_stop(Some(generation));
                return;
            }
        }

        if !core.signal.sleep(generation, core.interval()) {
            break;
        }
    }
}
