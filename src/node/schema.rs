// src/node/schema.rs

//! Input/output schemas and node descriptors.
//!
//! The schema wire format is the one graph-authoring tools already embed in
//! workflow files under `nodeInfo.input_types`:
//!
//! ```json
//! {
//!   "required": { "a": ["FLOAT", { "default": 0.0, "min": -10, "max": 10 }] },
//!   "optional": { "operation": [["add", "subtract"], { "default": "add" }] }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::{DEFAULT_ENTRY, Inputs, Node};

/// Semantic type of an input: either a tag such as `"FLOAT"` or a closed list
/// of allowed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputType {
    Tag(String),
    Choice(Vec<Value>),
}

/// Option bag attached to an input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,

    /// Anything else the authoring surface attached (e.g. `multiline`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single declared input: `[type, options]` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "InputSpecRepr", into = "InputSpecRepr")]
pub struct InputSpec {
    pub ty: InputType,
    pub options: InputOptions,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum InputSpecRepr {
    Full(InputType, InputOptions),
    Single((InputType,)),
    Bare(InputType),
}

impl From<InputSpecRepr> for InputSpec {
    fn from(repr: InputSpecRepr) -> Self {
        match repr {
            InputSpecRepr::Full(ty, options) => Self { ty, options },
            InputSpecRepr::Single((ty,)) | InputSpecRepr::Bare(ty) => Self {
                ty,
                options: InputOptions::default(),
            },
        }
    }
}

impl From<InputSpec> for InputSpecRepr {
    fn from(spec: InputSpec) -> Self {
        InputSpecRepr::Full(spec.ty, spec.options)
    }
}

impl InputSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            ty: InputType::Tag(tag.to_string()),
            options: InputOptions::default(),
        }
    }

    pub fn choice<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            ty: InputType::Choice(values.into_iter().map(Into::into).collect()),
            options: InputOptions::default(),
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.options.default = Some(value.into());
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.options.min = Some(min);
        self.options.max = Some(max);
        self
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.options.default.as_ref()
    }

    /// Check a single value against the declared bounds and choices.
    fn check(&self, name: &str, value: &Value) -> Result<(), ValidationError> {
        if let InputType::Choice(choices) = &self.ty {
            if !choices.contains(value) {
                return Err(ValidationError::NotAChoice {
                    input: name.to_string(),
                    value: value.clone(),
                });
            }
        }

        if let Some(n) = value.as_f64() {
            let below = self.options.min.is_some_and(|min| n < min);
            let above = self.options.max.is_some_and(|max| n > max);
            if below || above {
                return Err(ValidationError::OutOfRange {
                    input: name.to_string(),
                    value: n,
                    min: self.options.min,
                    max: self.options.max,
                });
            }
        }

        Ok(())
    }
}

/// Why a set of resolved inputs does not satisfy a schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required input: {0}")]
    MissingRequired(String),

    #[error("Input '{input}' = {value} is outside [{min:?}, {max:?}]")]
    OutOfRange {
        input: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },

    #[error("Input '{input}' = {value} is not one of the declared choices")]
    NotAChoice { input: String, value: Value },
}

/// Required and optional inputs of a node type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(default)]
    pub required: BTreeMap<String, InputSpec>,

    #[serde(default)]
    pub optional: BTreeMap<String, InputSpec>,
}

impl InputSchema {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }

    /// All declared inputs, required first.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &InputSpec)> {
        self.required.iter().chain(self.optional.iter())
    }

    pub fn get(&self, name: &str) -> Option<&InputSpec> {
        self.required.get(name).or_else(|| self.optional.get(name))
    }

    /// Every required input present, every present input within its bounds.
    pub fn validate(&self, inputs: &Inputs) -> Result<(), ValidationError> {
        for name in self.required.keys() {
            if !inputs.contains_key(name) {
                return Err(ValidationError::MissingRequired(name.clone()));
            }
        }

        for (name, value) in inputs {
            if let Some(spec) = self.get(name) {
                spec.check(name, value)?;
            }
        }

        Ok(())
    }
}

/// Human-facing metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMetadata {
    pub display_name: Option<String>,
    pub description: String,
    pub detailed_description: String,
    pub category: String,
    pub tags: Vec<String>,
}

/// Schema/metadata bundle describing a node type.
///
/// This is what `describe` returns, and also the shape authoring tools embed
/// in a placement's `data.nodeInfo`. Every field is optional on the way in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_types: Option<InputSchema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_types: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Constructor producing a fresh node instance.
pub type NodeFactory = Arc<dyn Fn() -> Box<dyn Node> + Send + Sync>;

/// A registered node type. Immutable once registered.
#[derive(Clone)]
pub struct NodeDescriptor {
    pub type_name: String,
    pub inputs: InputSchema,
    pub outputs: Vec<String>,
    pub function: String,
    pub metadata: NodeMetadata,
    factory: NodeFactory,
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("type_name", &self.type_name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("function", &self.function)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl NodeDescriptor {
    pub fn new<F>(type_name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Node> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.to_string(),
            inputs: InputSchema::default(),
            outputs: Vec::new(),
            function: DEFAULT_ENTRY.to_string(),
            metadata: NodeMetadata::default(),
            factory: Arc::new(factory),
        }
    }

    pub fn required(mut self, name: &str, spec: InputSpec) -> Self {
        self.inputs.required.insert(name.to_string(), spec);
        self
    }

    pub fn optional(mut self, name: &str, spec: InputSpec) -> Self {
        self.inputs.optional.insert(name.to_string(), spec);
        self
    }

    pub fn outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn function(mut self, function: &str) -> Self {
        self.function = function.to_string();
        self
    }

    pub fn display_name(mut self, name: &str) -> Self {
        self.metadata.display_name = Some(name.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.metadata.description = description.to_string();
        self
    }

    pub fn detailed_description(mut self, description: &str) -> Self {
        self.metadata.detailed_description = description.to_string();
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.metadata.category = category.to_string();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Same implementation under a different type name.
    pub fn renamed(&self, type_name: &str) -> Self {
        let mut copy = self.clone();
        copy.type_name = type_name.to_string();
        copy
    }

    /// Build a fresh instance of this node type.
    pub fn instantiate(&self) -> Box<dyn Node> {
        (self.factory)()
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            name: Some(self.type_name.clone()),
            display_name: Some(
                self.metadata
                    .display_name
                    .clone()
                    .unwrap_or_else(|| self.type_name.clone()),
            ),
            description: Some(self.metadata.description.clone()),
            detailed_description: Some(self.metadata.detailed_description.clone()),
            category: Some(self.metadata.category.clone()),
            tags: Some(self.metadata.tags.clone()),
            input_types: Some(self.inputs.clone()),
            return_types: Some(self.outputs.clone()),
            function: Some(self.function.clone()),
            extra: Map::new(),
        }
    }

    /// Contract checks applied at registration time.
    pub(crate) fn check_contract(&self) -> Result<(), String> {
        if self.type_name.trim().is_empty() {
            return Err("type name is empty".to_string());
        }
        if self.function.trim().is_empty() {
            return Err("entry function name is empty".to_string());
        }
        for (name, spec) in self.inputs.iter() {
            if let Some(default) = spec.default_value() {
                spec.check(name, default)
                    .map_err(|e| format!("default violates its own schema: {e}"))?;
            }
        }
        Ok(())
    }
}
