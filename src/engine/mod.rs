// src/engine/mod.rs

//! Workflow execution engine.
//!
//! - [`plan`]: compiled order plus one node instance per placement.
//! - [`resolver`]: per-node argument resolution.
//! - [`executor`]: one pass over a plan.
//! - [`scheduler`]: the continuous loop on its own worker thread.
//! - [`runtime`]: the [`Engine`] facade tying these together.
//!
//! Shared mutable state lives in `core`.

mod core;

pub mod executor;
pub mod plan;
pub mod resolver;
pub mod runtime;
pub mod scheduler;
pub mod status;

pub use executor::{PassExecutor, PassFailure};
pub use plan::{ExecutionPlan, PlanNode};
pub use resolver::{ExecutionResults, resolve_inputs, select_output};
pub use runtime::{Engine, RunReport};
pub use scheduler::WORKER_THREAD_NAME;
pub use status::{EngineStatus, LogEntry, RunLog, Severity};
