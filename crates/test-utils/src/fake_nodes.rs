#![allow(dead_code)]

//! Scripted node types for engine tests.
//!
//! All of them live in the `test` library so they can also be bound from
//! module manifests in discovery tests.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use flowloop::node::{
    Inputs, InputSpec, Node, NodeDescriptor, NodeLibrary, NodeOutput, NodeRegistry, NodeReturn,
    args,
};
use flowloop::types::DuplicatePolicy;

pub const TEST_LIBRARY: &str = "test";

/// Registry with the built-ins plus every test node.
pub fn test_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::with_builtins(DuplicatePolicy::Warn);
    registry.install_library(Arc::new(TestLibrary));
    for descriptor in TestLibrary.descriptors() {
        registry
            .register(descriptor)
            .expect("test descriptors are valid");
    }
    registry
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TestLibrary;

impl NodeLibrary for TestLibrary {
    fn name(&self) -> &str {
        TEST_LIBRARY
    }

    fn descriptors(&self) -> Vec<NodeDescriptor> {
        vec![
            constant(),
            double(),
            sum(),
            pair(),
            split(),
            fail_on_call(),
            panicking(),
            slow(),
            no_entry(),
        ]
    }
}

struct FnNode<F>(F);

impl<F> Node for FnNode<F>
where
    F: FnMut(&Inputs) -> Result<NodeReturn> + Send,
{
    fn call(&mut self, _function: &str, inputs: &Inputs) -> Result<NodeReturn> {
        (self.0)(inputs)
    }
}

fn fn_node<F>(f: F) -> Box<dyn Node>
where
    F: FnMut(&Inputs) -> Result<NodeReturn> + Send + 'static,
{
    Box::new(FnNode(f))
}

/// `Constant`: emits its `value` input (default 0).
pub fn constant() -> NodeDescriptor {
    NodeDescriptor::new("Constant", || {
        fn_node(|inputs| Ok(NodeReturn::scalar(inputs.get("value").cloned().unwrap_or(json!(0)))))
    })
    .required("value", InputSpec::new("FLOAT").with_default(0))
    .outputs(["FLOAT"])
    .category("test")
}

/// `Double`: `input * 2`.
pub fn double() -> NodeDescriptor {
    NodeDescriptor::new("Double", || {
        fn_node(|inputs| Ok(NodeReturn::scalar(args::f64(inputs, "input")? * 2.0)))
    })
    .required("input", InputSpec::new("FLOAT"))
    .outputs(["FLOAT"])
    .category("test")
}

/// `Sum`: `a + b`, both defaulting to 0.
pub fn sum() -> NodeDescriptor {
    NodeDescriptor::new("Sum", || {
        fn_node(|inputs| {
            let a = args::f64_or(inputs, "a", 0.0)?;
            let b = args::f64_or(inputs, "b", 0.0)?;
            Ok(NodeReturn::scalar(a + b))
        })
    })
    .required("a", InputSpec::new("FLOAT").with_default(0))
    .optional("b", InputSpec::new("FLOAT").with_default(0))
    .outputs(["FLOAT"])
    .category("test")
}

/// `Pair`: two positional outputs, `[input, input * 10]`.
pub fn pair() -> NodeDescriptor {
    NodeDescriptor::new("Pair", || {
        fn_node(|inputs| {
            let x = args::f64_or(inputs, "input", 1.0)?;
            Ok(NodeReturn::new(NodeOutput::Sequence(vec![json!(x), json!(x * 10.0)])))
        })
    })
    .optional("input", InputSpec::new("FLOAT"))
    .outputs(["FLOAT", "FLOAT"])
    .category("test")
}

/// `Split`: keyed outputs `left` and `right`.
pub fn split() -> NodeDescriptor {
    NodeDescriptor::new("Split", || {
        fn_node(|_inputs| {
            let mut map = Map::new();
            map.insert("left".into(), json!("L"));
            map.insert("right".into(), json!("R"));
            Ok(NodeReturn::new(NodeOutput::Keyed(map)))
        })
    })
    .outputs(["STRING", "STRING"])
    .category("test")
}

/// `FailOnCall`: counts its calls and fails on call number `fail_on`
/// (0 = never). Outputs the call count with a live update.
pub fn fail_on_call() -> NodeDescriptor {
    NodeDescriptor::new("FailOnCall", || {
        let mut calls: u64 = 0;
        fn_node(move |inputs| {
            calls += 1;
            let fail_on = args::f64_or(inputs, "fail_on", 0.0)? as u64;
            if fail_on != 0 && calls == fail_on {
                bail!("scripted failure on call {calls}");
            }
            Ok(NodeReturn::scalar(calls).with_live_update(json!({ "calls": calls })))
        })
    })
    .optional("fail_on", InputSpec::new("INT").with_default(0))
    .outputs(["INT"])
    .category("test")
}

/// `Panic`: panics when called.
pub fn panicking() -> NodeDescriptor {
    NodeDescriptor::new("Panic", || fn_node(|_inputs| panic!("scripted panic")))
        .category("test")
}

/// `Slow`: sleeps `millis` (default 50) then emits nothing.
pub fn slow() -> NodeDescriptor {
    NodeDescriptor::new("Slow", || {
        fn_node(|inputs| {
            let millis = args::f64_or(inputs, "millis", 50.0)?;
            thread::sleep(Duration::from_millis(millis as u64));
            Ok(NodeReturn::empty())
        })
    })
    .optional("millis", InputSpec::new("INT").with_default(50))
    .category("test")
}

/// `NoEntry`: declares entry function `run`, which its instances lack.
pub fn no_entry() -> NodeDescriptor {
    NodeDescriptor::new("NoEntry", || fn_node(|_inputs| Ok(NodeReturn::empty())))
        .function("run")
        .category("test")
}

/// Inputs seen by a [`recorder`] node, one entry per call.
pub type Recorded = Arc<Mutex<Vec<Inputs>>>;

/// A sink node type named `type_name` that records every input map it is
/// called with into the returned store.
pub fn recorder(type_name: &str) -> (NodeDescriptor, Recorded) {
    let store: Recorded = Arc::new(Mutex::new(Vec::new()));
    let shared = Arc::clone(&store);
    let descriptor = NodeDescriptor::new(type_name, move || {
        let shared = Arc::clone(&shared);
        fn_node(move |inputs| {
            shared.lock().push(inputs.clone());
            Ok(NodeReturn::empty())
        })
    })
    .optional("input", InputSpec::new("ANY"))
    .category("test");
    (descriptor, store)
}

/// Value of `name` in each recorded call.
pub fn recorded_values(store: &Recorded, name: &str) -> Vec<Value> {
    store
        .lock()
        .iter()
        .map(|inputs| inputs.get(name).cloned().unwrap_or(Value::Null))
        .collect()
}
