// src/graph/mod.rs

//! Workflow graphs: the wire model and the compiler that orders them.

pub mod compile;
pub mod model;

pub use compile::{CompiledOrder, compile};
pub use model::{Edge, NodeData, NodePlacement, WorkflowGraph};
