// src/node/basic.rs

//! Built-in `basic` node library.

use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use serde_json::json;
use tracing::info;

use super::{Inputs, InputSpec, Node, NodeDescriptor, NodeLibrary, NodeReturn, args};

pub const LIBRARY_NAME: &str = "basic";

/// Library exporting the basic nodes under their canonical type names.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicLibrary;

impl NodeLibrary for BasicLibrary {
    fn name(&self) -> &str {
        LIBRARY_NAME
    }

    fn descriptors(&self) -> Vec<NodeDescriptor> {
        vec![
            InputNode::descriptor(),
            OutputNode::descriptor(),
            TextProcessorNode::descriptor(),
            DelayNode::descriptor(),
            MathNode::descriptor(),
            CounterNode::descriptor(),
        ]
    }
}

/// Passes its `value` input through.
#[derive(Debug, Default)]
pub struct InputNode;

impl InputNode {
    pub fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("InputNode", || Box::new(InputNode))
            .required("value", InputSpec::new("STRING").with_default(""))
            .outputs(["STRING"])
            .display_name("Input")
            .description("Provides input data to the workflow")
            .category("input")
    }
}

impl Node for InputNode {
    fn call(&mut self, _function: &str, inputs: &Inputs) -> Result<NodeReturn> {
        let value = inputs.get("value").cloned().unwrap_or(json!(""));
        Ok(NodeReturn::scalar(value))
    }
}

/// Logs its input and passes it through.
#[derive(Debug, Default)]
pub struct OutputNode;

impl OutputNode {
    pub fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("OutputNode", || Box::new(OutputNode))
            .required("input", InputSpec::new("STRING"))
            .outputs(["STRING"])
            .display_name("Output")
            .description("Displays workflow output")
            .category("output")
    }
}

impl Node for OutputNode {
    fn call(&mut self, _function: &str, inputs: &Inputs) -> Result<NodeReturn> {
        let value = inputs.get("input").cloned().unwrap_or_default();
        info!(output = %value, "workflow output");
        Ok(NodeReturn::scalar(value))
    }
}

#[derive(Debug, Default)]
pub struct TextProcessorNode;

impl TextProcessorNode {
    pub fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("TextProcessorNode", || Box::new(TextProcessorNode))
            .required("text", InputSpec::new("STRING"))
            .required(
                "operation",
                InputSpec::choice(["uppercase", "lowercase", "reverse", "length"])
                    .with_default("uppercase"),
            )
            .outputs(["STRING"])
            .display_name("Text Processor")
            .description("Apply text transformations")
            .category("processing")
    }
}

impl Node for TextProcessorNode {
    fn call(&mut self, _function: &str, inputs: &Inputs) -> Result<NodeReturn> {
        let text = args::text_or(inputs, "text", "");
        let out = match args::text_or(inputs, "operation", "uppercase").as_str() {
            "uppercase" => text.to_uppercase(),
            "lowercase" => text.to_lowercase(),
            "reverse" => text.chars().rev().collect(),
            "length" => text.chars().count().to_string(),
            _ => text,
        };
        Ok(NodeReturn::scalar(out))
    }
}

/// Sleeps, then passes its input through.
#[derive(Debug, Default)]
pub struct DelayNode;

impl DelayNode {
    pub fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("DelayNode", || Box::new(DelayNode))
            .required("input", InputSpec::new("STRING"))
            .required(
                "delay_seconds",
                InputSpec::new("FLOAT").with_default(1.0).with_range(0.1, 10.0),
            )
            .outputs(["STRING"])
            .display_name("Delay")
            .description("Add delay to workflow execution")
            .category("control")
    }
}

impl Node for DelayNode {
    fn call(&mut self, _function: &str, inputs: &Inputs) -> Result<NodeReturn> {
        let secs = args::f64_or(inputs, "delay_seconds", 1.0)?;
        if !secs.is_finite() || secs < 0.0 {
            bail!("delay_seconds must be a non-negative number (got {secs})");
        }
        thread::sleep(Duration::from_secs_f64(secs));
        Ok(NodeReturn::scalar(
            inputs.get("input").cloned().unwrap_or_default(),
        ))
    }
}

#[derive(Debug, Default)]
pub struct MathNode;

impl MathNode {
    pub fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("MathNode", || Box::new(MathNode))
            .required("a", InputSpec::new("FLOAT").with_default(0.0))
            .required("b", InputSpec::new("FLOAT").with_default(0.0))
            .required(
                "operation",
                InputSpec::choice(["add", "subtract", "multiply", "divide"])
                    .with_default("add"),
            )
            .outputs(["FLOAT"])
            .display_name("Math")
            .description("Perform basic mathematical operations")
            .category("processing")
    }
}

impl Node for MathNode {
    fn call(&mut self, _function: &str, inputs: &Inputs) -> Result<NodeReturn> {
        let a = args::f64_or(inputs, "a", 0.0)?;
        let b = args::f64_or(inputs, "b", 0.0)?;
        let result = match args::text_or(inputs, "operation", "add").as_str() {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    bail!("Division by zero");
                }
                a / b
            }
            other => bail!("Unknown operation: {other}"),
        };
        Ok(NodeReturn::scalar(result))
    }
}

/// Counts its own invocations. State lives for one workflow load.
#[derive(Debug, Default)]
pub struct CounterNode {
    count: i64,
}

impl CounterNode {
    pub fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new("CounterNode", || Box::<CounterNode>::default())
            .required("step", InputSpec::new("INT").with_default(1))
            .optional("reset", InputSpec::new("BOOLEAN").with_default(false))
            .outputs(["INT"])
            .display_name("Counter")
            .description("Counts iterations")
            .detailed_description(
                "Adds `step` to an internal counter on every call and reports the \
                 running total as a live update. Setting `reset` zeroes the counter first.",
            )
            .category("control")
            .tags(["stateful"])
    }
}

impl Node for CounterNode {
    fn call(&mut self, _function: &str, inputs: &Inputs) -> Result<NodeReturn> {
        if args::bool_or(inputs, "reset", false) {
            self.count = 0;
        }
        let step = args::f64_or(inputs, "step", 1.0)? as i64;
        self.count += step;
        Ok(NodeReturn::scalar(self.count).with_live_update(json!({ "count": self.count })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeOutput;
    use serde_json::Value;

    fn inputs(pairs: &[(&str, Value)]) -> Inputs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn math_divides_and_rejects_zero() {
        let mut node = MathNode;
        let ok = node
            .call("execute", &inputs(&[("a", json!(9)), ("b", json!(3)), ("operation", json!("divide"))]))
            .unwrap();
        assert_eq!(ok.outputs, NodeOutput::Scalar(json!(3.0)));

        let err = node
            .call("execute", &inputs(&[("a", json!(1)), ("b", json!(0)), ("operation", json!("divide"))]))
            .unwrap_err();
        assert!(err.to_string().contains("Division by zero"));
    }

    #[test]
    fn text_processor_operations() {
        let mut node = TextProcessorNode;
        let run = |node: &mut TextProcessorNode, op: &str| {
            node.call("execute", &inputs(&[("text", json!("Hello")), ("operation", json!(op))]))
                .unwrap()
                .outputs
        };
        assert_eq!(run(&mut node, "uppercase"), NodeOutput::Scalar(json!("HELLO")));
        assert_eq!(run(&mut node, "reverse"), NodeOutput::Scalar(json!("olleH")));
        assert_eq!(run(&mut node, "length"), NodeOutput::Scalar(json!("5")));
    }

    #[test]
    fn counter_keeps_state_between_calls() {
        let mut node = CounterNode::default();
        let none = Inputs::new();
        node.call("execute", &none).unwrap();
        let second = node.call("execute", &none).unwrap();
        assert_eq!(second.outputs, NodeOutput::Scalar(json!(2)));
        assert_eq!(second.live_update, Some(json!({ "count": 2 })));

        let reset = node.call("execute", &inputs(&[("reset", json!(true))])).unwrap();
        assert_eq!(reset.outputs, NodeOutput::Scalar(json!(1)));
    }

    #[test]
    fn library_exports_all_basic_types() {
        let names: Vec<_> = BasicLibrary
            .descriptors()
            .into_iter()
            .map(|d| d.type_name)
            .collect();
        assert!(names.contains(&"MathNode".to_string()));
        assert!(BasicLibrary.descriptor("CounterNode").is_some());
        assert!(BasicLibrary.descriptor("Nope").is_none());
    }
}
