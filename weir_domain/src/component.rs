// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Component Interface
//!
//! A component is the unit of work the run engine schedules: it declares a
//! set of named, typed inputs, a single typed output record, and an
//! asynchronous `run`. The engine never inspects a component's concrete
//! types; it works against the [`ComponentDescriptor`] the component
//! exposes and against field-keyed JSON documents.
//!
//! ## Descriptors instead of reflection
//!
//! Inputs and outputs are declared explicitly through
//! [`ComponentDescriptor::builder`]. The descriptor must be available
//! without executing the component; the graph validator reads it to check
//! wiring and type compatibility before any run starts.
//!
//! ## Control fields
//!
//! [`ComponentOutput`] separates the data payload from the two
//! engine-reserved control signals: an optional `state` map that the state
//! manager stages for the next version, and a `stop_pipeline` flag that
//! short-circuits the run when a source observes no changes. Only the data
//! fields are persisted as the node result.
//!
//! ## Status machine
//!
//! Each node moves through [`RunStatus`] exactly once per run:
//! `PENDING -> RUNNING -> {DONE | FAILED | STOP_PIPELINE}`. Terminal states
//! never transition further; the engine rejects such attempts with a
//! status-update error.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PipelineError;

/// Runtime type tag for descriptor checking.
///
/// Tags form a small structural language: scalars, domain payloads,
/// homogeneous sequences, and an opaque `Any` for values the engine cannot
/// resolve. Assignability is checked at validation time, never at run time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    Bool,
    Integer,
    Float,
    Text,
    Item,
    Operation,
    Group,
    Metadata,
    Sequence(Box<TypeTag>),
    Any,
}

impl TypeTag {
    /// Convenience constructor for sequence tags.
    pub fn sequence(elem: TypeTag) -> Self {
        TypeTag::Sequence(Box::new(elem))
    }

    /// Structural assignability check.
    ///
    /// Identical tags assign; sequences assign when their element tags
    /// assign; `Any` on either side is conservatively permitted because an
    /// opaque value cannot be proven incompatible before execution.
    pub fn assignable_to(&self, target: &TypeTag) -> bool {
        match (self, target) {
            (TypeTag::Any, _) | (_, TypeTag::Any) => true,
            (TypeTag::Sequence(a), TypeTag::Sequence(b)) => a.assignable_to(b),
            (a, b) => a == b,
        }
    }
}

/// Declared input parameter: its type tag and whether a default exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub tag: TypeTag,
    pub has_default: bool,
}

/// Declared output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub tag: TypeTag,
}

/// Introspectable interface of a component, derived once at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub inputs: BTreeMap<String, InputSpec>,
    pub outputs: BTreeMap<String, OutputSpec>,
    /// True when the component wants its prior versioned state injected.
    pub consumes_state: bool,
}

impl ComponentDescriptor {
    pub fn builder() -> DescriptorBuilder {
        DescriptorBuilder::default()
    }

    /// Names of required inputs (those without defaults).
    pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|(_, spec)| !spec.has_default)
            .map(|(name, _)| name.as_str())
    }
}

/// Builder for [`ComponentDescriptor`].
#[derive(Debug, Default)]
pub struct DescriptorBuilder {
    inputs: BTreeMap<String, InputSpec>,
    outputs: BTreeMap<String, OutputSpec>,
    consumes_state: bool,
}

impl DescriptorBuilder {
    /// Declares a required input parameter.
    pub fn input(mut self, name: impl Into<String>, tag: TypeTag) -> Self {
        self.inputs.insert(
            name.into(),
            InputSpec {
                tag,
                has_default: false,
            },
        );
        self
    }

    /// Declares an input parameter with a default value.
    pub fn optional_input(mut self, name: impl Into<String>, tag: TypeTag) -> Self {
        self.inputs.insert(
            name.into(),
            InputSpec {
                tag,
                has_default: true,
            },
        );
        self
    }

    /// Declares an output field.
    pub fn output(mut self, name: impl Into<String>, tag: TypeTag) -> Self {
        self.outputs.insert(name.into(), OutputSpec { tag });
        self
    }

    /// Marks the component as consuming its prior versioned state.
    pub fn consumes_state(mut self) -> Self {
        self.consumes_state = true;
        self
    }

    pub fn build(self) -> ComponentDescriptor {
        ComponentDescriptor {
            inputs: self.inputs,
            outputs: self.outputs,
            consumes_state: self.consumes_state,
        }
    }
}

/// Resolved invocation arguments for one node execution.
///
/// Values are field-keyed JSON documents gathered from upstream results and
/// runtime inputs. `state` carries the component's prior committed state
/// when the descriptor declares `consumes_state`.
#[derive(Debug, Clone, Default)]
pub struct ComponentInput {
    values: Map<String, Value>,
    state: Map<String, Value>,
}

impl ComponentInput {
    pub fn new(values: Map<String, Value>, state: Map<String, Value>) -> Self {
        Self { values, state }
    }

    /// Inserts a single argument, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Deserializes a required argument.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, PipelineError> {
        let value = self.values.get(name).ok_or_else(|| {
            PipelineError::validation(format!("Required parameter '{name}' not provided"))
        })?;
        serde_json::from_value(value.clone())
            .map_err(|e| PipelineError::validation(format!("Parameter '{name}': {e}")))
    }

    /// Deserializes an optional argument, falling back to its default.
    pub fn optional<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, PipelineError> {
        match self.values.get(name) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| PipelineError::validation(format!("Parameter '{name}': {e}"))),
            None => Ok(T::default()),
        }
    }

    /// The prior versioned state map injected by the engine.
    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    /// Deserializes one entry of the prior state map, if present.
    pub fn state_entry<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PipelineError> {
        match self.state.get(key) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| PipelineError::serialization(format!("State entry '{key}': {e}"))),
            None => Ok(None),
        }
    }
}

/// Typed output of one component execution.
///
/// `fields` is the field-keyed data payload persisted as the node result.
/// `state` and `stop_pipeline` are engine control signals and are not
/// persisted with the result.
#[derive(Debug, Clone, Default)]
pub struct ComponentOutput {
    pub fields: Map<String, Value>,
    pub state: Option<Map<String, Value>>,
    pub stop_pipeline: bool,
}

impl ComponentOutput {
    /// Builds an output from any serializable record struct.
    ///
    /// The record must serialize to a JSON object; its top-level keys
    /// become the output fields.
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self, PipelineError> {
        match serde_json::to_value(record)? {
            Value::Object(fields) => Ok(Self {
                fields,
                state: None,
                stop_pipeline: false,
            }),
            other => Err(PipelineError::serialization(format!(
                "Component output must serialize to an object, got {other}"
            ))),
        }
    }

    /// Attaches a state map to be staged for the next version.
    pub fn with_state(mut self, state: Map<String, Value>) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the stop-pipeline control flag.
    pub fn with_stop_pipeline(mut self, stop: bool) -> Self {
        self.stop_pipeline = stop;
        self
    }
}

/// Interface that needs to be implemented by all components.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the engine invokes `run` at most
/// once per node per run, possibly from different worker threads across
/// runs.
#[async_trait]
pub trait Component: Send + Sync {
    /// The component's declared inputs and outputs. Must not execute the
    /// component.
    fn descriptor(&self) -> ComponentDescriptor;

    /// Executes the unit of work with resolved inputs.
    async fn run(&self, input: ComponentInput) -> Result<ComponentOutput, PipelineError>;
}

impl std::fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("descriptor", &self.descriptor())
            .finish()
    }
}

/// Status of a pipeline component run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Done,
    Failed,
    StopPipeline,
}

impl RunStatus {
    /// Get possible next statuses from current.
    pub fn possible_next_statuses(&self) -> &'static [RunStatus] {
        match self {
            RunStatus::Pending => &[RunStatus::Running],
            RunStatus::Running => &[RunStatus::Done, RunStatus::Failed, RunStatus::StopPipeline],
            // terminal states cannot transition
            _ => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.possible_next_statuses().is_empty()
    }

    /// Store representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Done => "DONE",
            RunStatus::Failed => "FAILED",
            RunStatus::StopPipeline => "STOP_PIPELINE",
        }
    }

    pub fn parse(value: &str) -> Option<RunStatus> {
        match value {
            "PENDING" => Some(RunStatus::Pending),
            "RUNNING" => Some(RunStatus::Running),
            "DONE" => Some(RunStatus::Done),
            "FAILED" => Some(RunStatus::Failed),
            "STOP_PIPELINE" => Some(RunStatus::StopPipeline),
            _ => None,
        }
    }
}
