// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline & Run Engine
//!
//! The pipeline is a validated DAG of components plus the concurrent
//! executor that drives them through the per-node status machine.
//!
//! ## Validation
//!
//! `validate` runs after construction and after every mutation, in order:
//!
//! 1. the graph must be acyclic;
//! 2. every input wiring must address an existing parameter exactly once,
//!    reference an existing source (and, when field-qualified, a declared
//!    output field), and pass the structural type check;
//! 3. every required parameter must be covered by an edge or flagged as
//!    "must be provided via runtime inputs", which `validate_run_inputs`
//!    enforces per run.
//!
//! ## Execution model
//!
//! Every node runs as an independent tokio task inside a
//! [`JoinSet`](tokio::task::JoinSet). A node task first re-checks that all
//! predecessors are DONE (it is re-entered when the last one finishes),
//! then claims the RUNNING status under the pipeline's status lock, which
//! makes the transition the sole serialization point: at most one task
//! executes a node per run. Completed nodes schedule their direct
//! successors exactly once. Sibling nodes with no edge between them run
//! concurrently and in unspecified order.
//!
//! A node returning `stop_pipeline` stops downstream scheduling and the
//! run finalizes as stopped-early. A failing node writes an error payload
//! as its result, leaves its successors PENDING, and fails the run;
//! already-runnable independent branches still drain. A failed run
//! discards its pending state version; anything else commits it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use weir_domain::component::{Component, ComponentDescriptor, ComponentInput, RunStatus};
use weir_domain::error::PipelineError;
use weir_domain::graph::{GraphEdge, GraphNode, PipelineGraph};
use weir_domain::repositories::ResultStore;

use crate::infrastructure::run_tracker::{
    ComponentPerformanceRecord, PipelineRunStatus, RunTracker,
};
use crate::infrastructure::state_manager::StateManager;
use crate::infrastructure::stores::InMemoryStore;

/// Node wrapping one component under a unique name.
pub struct TaskNode {
    name: String,
    component: Arc<dyn Component>,
    descriptor: ComponentDescriptor,
    parents: Vec<String>,
    children: Vec<String>,
}

impl TaskNode {
    pub fn new(name: impl Into<String>, component: Arc<dyn Component>) -> Self {
        let descriptor = component.descriptor();
        Self {
            name: name.into(),
            component,
            descriptor,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }
}

impl GraphNode for TaskNode {
    fn name(&self) -> &str {
        &self.name
    }
    fn parents(&self) -> &[String] {
        &self.parents
    }
    fn children(&self) -> &[String] {
        &self.children
    }
    fn parents_mut(&mut self) -> &mut Vec<String> {
        &mut self.parents
    }
    fn children_mut(&mut self) -> &mut Vec<String> {
        &mut self.children
    }
}

/// Wiring between two nodes: target parameter name to source reference.
///
/// A source reference is `"<component>"` for a whole-output binding or
/// `"<component>.<field>"` for a field binding.
#[derive(Debug, Clone)]
pub struct PipelineEdge {
    pub start: String,
    pub end: String,
    pub input_config: BTreeMap<String, String>,
}

impl GraphEdge for PipelineEdge {
    fn start(&self) -> &str {
        &self.start
    }
    fn end(&self) -> &str {
        &self.end
    }
}

/// Where one resolved parameter comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParamBinding {
    component: String,
    field: Option<String>,
}

/// Runtime inputs: component name -> parameter name -> value.
pub type RuntimeInputs = Map<String, Value>;

/// Container for pipeline execution results.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub run_id: String,
    pub results: Map<String, Value>,
    pub success: bool,
    pub stopped_early: bool,
    pub status: PipelineRunStatus,
}

/// Outcome of one node task.
enum NodeOutcome {
    /// Some predecessor is not DONE yet; the node will be re-entered.
    NotReady,
    /// Another task already claimed this node.
    AlreadyClaimed,
    /// The node finished; schedule these successors.
    Done(Vec<String>),
    /// The node asked the run to stop early.
    Stopped,
    /// The component failed with this message.
    Failed(String),
}

/// Pipeline implementation with component validation and execution.
pub struct Pipeline {
    graph: PipelineGraph<TaskNode, PipelineEdge>,
    store: Arc<dyn ResultStore>,
    state: Arc<StateManager>,
    tracker: Arc<RunTracker>,
    status_lock: Arc<tokio::sync::Mutex<()>>,
    is_validated: bool,
    param_mapping: HashMap<String, BTreeMap<String, ParamBinding>>,
    missing_inputs: HashMap<String, Vec<String>>,
}

impl Pipeline {
    /// Creates a pipeline over an in-memory store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    /// Creates a pipeline over the given result store. The state manager
    /// and run tracker share the same store.
    pub fn with_store(store: Arc<dyn ResultStore>) -> Self {
        Self {
            graph: PipelineGraph::new(),
            state: Arc::new(StateManager::new(store.clone())),
            tracker: Arc::new(RunTracker::new(store.clone())),
            status_lock: Arc::new(tokio::sync::Mutex::new(())),
            store,
            is_validated: false,
            param_mapping: HashMap::new(),
            missing_inputs: HashMap::new(),
        }
    }

    pub fn store(&self) -> Arc<dyn ResultStore> {
        self.store.clone()
    }

    pub fn state_manager(&self) -> Arc<StateManager> {
        self.state.clone()
    }

    pub fn run_tracker(&self) -> Arc<RunTracker> {
        self.tracker.clone()
    }

    /// Add a component to the pipeline.
    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        component: Arc<dyn Component>,
    ) -> Result<(), PipelineError> {
        self.graph.add_node(TaskNode::new(name, component))?;
        self.is_validated = false;
        Ok(())
    }

    /// Replace an existing component with a new one.
    pub fn set_component(
        &mut self,
        name: impl Into<String>,
        component: Arc<dyn Component>,
    ) -> Result<(), PipelineError> {
        self.graph.set_node(TaskNode::new(name, component))?;
        self.is_validated = false;
        Ok(())
    }

    /// Connect two components with an input wiring.
    pub fn connect(
        &mut self,
        start: &str,
        end: &str,
        input_config: BTreeMap<String, String>,
    ) -> Result<(), PipelineError> {
        if !self.graph.contains(start) {
            return Err(PipelineError::component_not_found(format!(
                "Component '{start}' not found"
            )));
        }
        if !self.graph.contains(end) {
            return Err(PipelineError::component_not_found(format!(
                "Component '{end}' not found"
            )));
        }
        self.graph.add_edge(PipelineEdge {
            start: start.to_string(),
            end: end.to_string(),
            input_config,
        })?;
        self.is_validated = false;
        Ok(())
    }

    /// Validate the entire pipeline: acyclicity, input wiring, and type
    /// compatibility.
    pub fn validate(&mut self) -> Result<(), PipelineError> {
        if self.is_validated {
            return Ok(());
        }

        if self.graph.is_cyclic() {
            return Err(PipelineError::definition("Pipeline contains cycles"));
        }

        let mut param_mapping = HashMap::new();
        let mut missing_inputs = HashMap::new();
        for node in self.graph.nodes() {
            let (mapping, missing) = self.validate_component_connections(node)?;
            param_mapping.insert(node.name().to_string(), mapping);
            missing_inputs.insert(node.name().to_string(), missing);
        }

        self.param_mapping = param_mapping;
        self.missing_inputs = missing_inputs;
        self.is_validated = true;
        Ok(())
    }

    /// Validate the incoming wiring of a single node and compute which
    /// required parameters remain for runtime inputs.
    fn validate_component_connections(
        &self,
        node: &TaskNode,
    ) -> Result<(BTreeMap<String, ParamBinding>, Vec<String>), PipelineError> {
        let descriptor = node.descriptor();
        let mut mapping: BTreeMap<String, ParamBinding> = BTreeMap::new();

        for edge in self.graph.previous_edges(node.name()) {
            for (target_param, source_ref) in &edge.input_config {
                let target_spec = descriptor.inputs.get(target_param).ok_or_else(|| {
                    PipelineError::validation(format!(
                        "Parameter '{target_param}' is not a valid input for component '{}'",
                        node.name()
                    ))
                })?;
                if mapping.contains_key(target_param) {
                    return Err(PipelineError::validation(format!(
                        "Parameter '{target_param}' is already mapped for '{}'",
                        node.name()
                    )));
                }

                let binding = match source_ref.split_once('.') {
                    Some((source_component, output_field)) => {
                        let source_node = self.graph.node(source_component).ok_or_else(|| {
                            PipelineError::validation(format!(
                                "Source component '{source_component}' does not exist"
                            ))
                        })?;
                        let output_spec = source_node
                            .descriptor()
                            .outputs
                            .get(output_field)
                            .ok_or_else(|| {
                                PipelineError::validation(format!(
                                    "Output field '{output_field}' does not exist in component '{source_component}'"
                                ))
                            })?;
                        if !output_spec.tag.assignable_to(&target_spec.tag) {
                            return Err(PipelineError::validation(format!(
                                "Type mismatch: {source_component}.{output_field} ({:?}) is not compatible with {}.{target_param} ({:?})",
                                output_spec.tag,
                                node.name(),
                                target_spec.tag
                            )));
                        }
                        ParamBinding {
                            component: source_component.to_string(),
                            field: Some(output_field.to_string()),
                        }
                    }
                    None => {
                        if !self.graph.contains(source_ref) {
                            return Err(PipelineError::validation(format!(
                                "Source component '{source_ref}' does not exist"
                            )));
                        }
                        ParamBinding {
                            component: source_ref.to_string(),
                            field: None,
                        }
                    }
                };
                mapping.insert(target_param.clone(), binding);
            }
        }

        let missing = descriptor
            .required_inputs()
            .filter(|param| !mapping.contains_key(*param))
            .map(str::to_string)
            .collect();
        Ok((mapping, missing))
    }

    /// Validate that all uncovered required inputs are provided in the
    /// runtime inputs.
    pub fn validate_run_inputs(&self, inputs: &RuntimeInputs) -> Result<(), PipelineError> {
        for (component, missing) in &self.missing_inputs {
            let provided = inputs.get(component).and_then(Value::as_object);
            for param in missing {
                let supplied = provided.is_some_and(|p| p.contains_key(param));
                if !supplied {
                    return Err(PipelineError::validation(format!(
                        "Required parameter '{param}' for component '{component}' not provided"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Execute the pipeline once and collect the leaf results.
    pub async fn run(&mut self, inputs: RuntimeInputs) -> Result<PipelineResult, PipelineError> {
        self.validate()?;
        self.validate_run_inputs(&inputs)?;

        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, "starting pipeline run");

        self.tracker.record_run_start(&run_id, inputs.clone()).await?;
        self.state.initialize().await?;
        self.state.prepare_new_version(&run_id).await;

        for node in self.graph.nodes() {
            self.store
                .add_status_for_component(&run_id, node.name(), RunStatus::Pending.as_str())
                .await?;
        }

        let ctx = Arc::new(self.execution_context(&run_id, inputs));

        let mut tasks: JoinSet<(String, Result<NodeOutcome, PipelineError>)> = JoinSet::new();
        for root in self.graph.roots() {
            let name = root.name().to_string();
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let outcome = execute_node(&ctx, &name).await;
                (name, outcome)
            });
        }

        let mut stopped_early = false;
        let mut failure: Option<String> = None;
        let mut engine_error: Option<PipelineError> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(NodeOutcome::Done(successors)))) => {
                    debug!(run_id = %run_id, node = %name, "node finished");
                    for successor in successors {
                        let ctx = ctx.clone();
                        tasks.spawn(async move {
                            let outcome = execute_node(&ctx, &successor).await;
                            (successor, outcome)
                        });
                    }
                }
                Ok((name, Ok(NodeOutcome::Stopped))) => {
                    info!(run_id = %run_id, node = %name, "node requested pipeline stop");
                    stopped_early = true;
                }
                Ok((name, Ok(NodeOutcome::Failed(error)))) => {
                    warn!(run_id = %run_id, node = %name, error = %error, "node failed");
                    failure.get_or_insert(format!("Component '{name}' failed: {error}"));
                }
                Ok((_, Ok(NodeOutcome::NotReady | NodeOutcome::AlreadyClaimed))) => {}
                Ok((name, Err(e))) => {
                    warn!(run_id = %run_id, node = %name, error = %e, "engine error during node execution");
                    engine_error.get_or_insert(e);
                }
                Err(join_error) => {
                    let message = if join_error.is_cancelled() {
                        "node task cancelled".to_string()
                    } else {
                        format!("node task panicked: {join_error}")
                    };
                    failure.get_or_insert(message);
                }
            }
        }

        if let Some(e) = engine_error {
            self.state.discard_pending().await;
            self.tracker.record_run_failure(&run_id, &e.to_string()).await?;
            return Err(e);
        }

        if let Some(error) = failure {
            self.state.discard_pending().await;
            self.tracker.record_run_failure(&run_id, &error).await?;
            let results = self.collect_leaf_results(&run_id).await?;
            return Ok(PipelineResult {
                run_id,
                results,
                success: false,
                stopped_early: false,
                status: PipelineRunStatus::Failed,
            });
        }

        let results = self.collect_leaf_results(&run_id).await?;

        // Carry unstaged state forward so a short-circuited run does not
        // drop the prior state of components that never executed.
        for node in self.graph.nodes() {
            if node.descriptor().consumes_state && !self.state.is_staged(node.name()).await {
                let prior = self.state.get_component_state(node.name()).await?;
                if !prior.is_empty() {
                    self.state.stage_component_state(node.name(), prior).await?;
                }
            }
        }
        self.state.commit_version().await?;
        self.tracker.record_run_completion(&run_id, stopped_early).await?;

        info!(run_id = %run_id, stopped_early, "pipeline run finished");
        Ok(PipelineResult {
            run_id,
            results,
            success: true,
            stopped_early,
            status: if stopped_early {
                PipelineRunStatus::Stopped
            } else {
                PipelineRunStatus::Completed
            },
        })
    }

    async fn collect_leaf_results(&self, run_id: &str) -> Result<Map<String, Value>, PipelineError> {
        let mut results = Map::new();
        for leaf in self.graph.leaves() {
            if let Some(result) = self
                .store
                .get_result_for_component(run_id, leaf.name())
                .await?
            {
                results.insert(leaf.name().to_string(), result);
            }
        }
        Ok(results)
    }

    /// Get the current status of a node in a specific run.
    pub async fn get_node_status(
        &self,
        run_id: &str,
        node_name: &str,
    ) -> Result<RunStatus, PipelineError> {
        node_status(self.store.as_ref(), run_id, node_name).await
    }

    /// Set the status of a node in a specific run, enforcing the
    /// transition rules.
    pub async fn set_node_status(
        &self,
        run_id: &str,
        node_name: &str,
        status: RunStatus,
    ) -> Result<(), PipelineError> {
        set_status_checked(self.store.as_ref(), &self.status_lock, run_id, node_name, status).await
    }

    fn execution_context(&self, run_id: &str, inputs: RuntimeInputs) -> ExecutionContext {
        let mut components = HashMap::new();
        let mut descriptors = HashMap::new();
        let mut predecessors = HashMap::new();
        let mut successors = HashMap::new();
        for node in self.graph.nodes() {
            components.insert(node.name().to_string(), node.component.clone());
            descriptors.insert(node.name().to_string(), node.descriptor().clone());
            predecessors.insert(node.name().to_string(), node.parents().to_vec());
            successors.insert(node.name().to_string(), node.children().to_vec());
        }
        ExecutionContext {
            run_id: run_id.to_string(),
            components,
            descriptors,
            predecessors,
            successors,
            param_mapping: self.param_mapping.clone(),
            runtime_inputs: inputs,
            store: self.store.clone(),
            state: self.state.clone(),
            tracker: self.tracker.clone(),
            status_lock: self.status_lock.clone(),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of a validated pipeline shared by node tasks.
struct ExecutionContext {
    run_id: String,
    components: HashMap<String, Arc<dyn Component>>,
    descriptors: HashMap<String, ComponentDescriptor>,
    predecessors: HashMap<String, Vec<String>>,
    successors: HashMap<String, Vec<String>>,
    param_mapping: HashMap<String, BTreeMap<String, ParamBinding>>,
    runtime_inputs: RuntimeInputs,
    store: Arc<dyn ResultStore>,
    state: Arc<StateManager>,
    tracker: Arc<RunTracker>,
    /// Serializes status transitions: the claim of RUNNING decides which
    /// task executes a node.
    status_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ExecutionContext {
    async fn set_node_status(
        &self,
        node_name: &str,
        status: RunStatus,
    ) -> Result<(), PipelineError> {
        set_status_checked(
            self.store.as_ref(),
            &self.status_lock,
            &self.run_id,
            node_name,
            status,
        )
        .await
    }
}

/// Set a node's status, enforcing the transition rules. The read-check-
/// write happens under the status lock, making the transition atomic with
/// respect to competing tasks.
async fn set_status_checked(
    store: &dyn ResultStore,
    lock: &tokio::sync::Mutex<()>,
    run_id: &str,
    node_name: &str,
    status: RunStatus,
) -> Result<(), PipelineError> {
    let _guard = lock.lock().await;
    let current = node_status(store, run_id, node_name).await?;
    if !current.possible_next_statuses().contains(&status) {
        return Err(PipelineError::status_update(format!(
            "{} -> {} for node '{node_name}'",
            current.as_str(),
            status.as_str()
        )));
    }
    store
        .add_status_for_component(run_id, node_name, status.as_str())
        .await
}

async fn node_status(
    store: &dyn ResultStore,
    run_id: &str,
    node_name: &str,
) -> Result<RunStatus, PipelineError> {
    let status = store.get_status_for_component(run_id, node_name).await?;
    Ok(status
        .as_deref()
        .and_then(RunStatus::parse)
        .unwrap_or(RunStatus::Pending))
}

/// Execute a single node in the pipeline.
async fn execute_node(ctx: &ExecutionContext, node_name: &str) -> Result<NodeOutcome, PipelineError> {
    // All dependencies must be complete; the node is re-entered when the
    // last missing one transitions to DONE.
    for predecessor in &ctx.predecessors[node_name] {
        if node_status(ctx.store.as_ref(), &ctx.run_id, predecessor).await? != RunStatus::Done {
            return Ok(NodeOutcome::NotReady);
        }
    }

    // Claim the RUNNING state; losing the claim means another task owns
    // this node.
    match ctx.set_node_status(node_name, RunStatus::Running).await {
        Ok(()) => {}
        Err(PipelineError::StatusUpdate(_)) => return Ok(NodeOutcome::AlreadyClaimed),
        Err(e) => return Err(e),
    }

    debug!(run_id = %ctx.run_id, node = %node_name, "executing node");
    let component = ctx.components[node_name].clone();
    let descriptor = &ctx.descriptors[node_name];

    let input = resolve_inputs(ctx, node_name, descriptor).await?;
    let started = Instant::now();

    match component.run(input).await {
        Ok(output) => {
            if let Some(state) = output.state {
                if !state.is_empty() {
                    ctx.state.stage_component_state(node_name, state).await?;
                }
            }
            ctx.store
                .add_result_for_component(&ctx.run_id, node_name, Value::Object(output.fields), true)
                .await?;
            ctx.tracker
                .record_component_performance(
                    &ctx.run_id,
                    ComponentPerformanceRecord {
                        component_name: node_name.to_string(),
                        execution_time_seconds: started.elapsed().as_secs_f64(),
                        memory_peak_mb: None,
                    },
                )
                .await?;

            let status = if output.stop_pipeline {
                RunStatus::StopPipeline
            } else {
                RunStatus::Done
            };
            ctx.set_node_status(node_name, status).await?;
            ctx.tracker
                .record_component_status(&ctx.run_id, node_name, status.as_str())
                .await?;

            if output.stop_pipeline {
                Ok(NodeOutcome::Stopped)
            } else {
                Ok(NodeOutcome::Done(ctx.successors[node_name].clone()))
            }
        }
        Err(error) => {
            let message = error.to_string();
            let mut payload = Map::new();
            payload.insert("error".to_string(), Value::String(message.clone()));
            ctx.store
                .add_result_for_component(&ctx.run_id, node_name, Value::Object(payload), true)
                .await?;
            ctx.set_node_status(node_name, RunStatus::Failed).await?;
            ctx.tracker
                .record_component_status(&ctx.run_id, node_name, RunStatus::Failed.as_str())
                .await?;
            Ok(NodeOutcome::Failed(message))
        }
    }
}

/// Gather a node's inputs from runtime inputs, upstream results, and its
/// prior versioned state.
async fn resolve_inputs(
    ctx: &ExecutionContext,
    node_name: &str,
    descriptor: &ComponentDescriptor,
) -> Result<ComponentInput, PipelineError> {
    let mut values = Map::new();

    if let Some(Value::Object(component_inputs)) = ctx.runtime_inputs.get(node_name) {
        for (param, value) in component_inputs {
            values.insert(param.clone(), value.clone());
        }
    }

    if let Some(mapping) = ctx.param_mapping.get(node_name) {
        for (param, binding) in mapping {
            let source_result = ctx
                .store
                .get_result_for_component(&ctx.run_id, &binding.component)
                .await?;
            let Some(source_result) = source_result else {
                continue;
            };
            match &binding.field {
                Some(field) => {
                    if let Some(value) = source_result.get(field) {
                        values.insert(param.clone(), value.clone());
                    }
                }
                None => {
                    values.insert(param.clone(), source_result);
                }
            }
        }
    }

    let state = if descriptor.consumes_state {
        ctx.state.get_component_state(node_name).await?
    } else {
        Map::new()
    };

    Ok(ComponentInput::new(values, state))
}

/// Definition of a pipeline component for declarative construction.
pub struct ComponentDefinition {
    pub name: String,
    pub component: Arc<dyn Component>,
    pub run_params: Map<String, Value>,
}

/// Definition of a connection between pipeline components.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConnectionDefinition {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub input_config: BTreeMap<String, String>,
}

/// Definition of a pipeline with components and connections.
pub struct PipelineDefinition {
    pub components: Vec<ComponentDefinition>,
    pub connections: Vec<ConnectionDefinition>,
}

impl PipelineDefinition {
    /// Pre-configured run parameters, keyed by component name.
    pub fn run_params(&self) -> RuntimeInputs {
        self.components
            .iter()
            .filter(|c| !c.run_params.is_empty())
            .map(|c| (c.name.clone(), Value::Object(c.run_params.clone())))
            .collect()
    }
}

impl Pipeline {
    /// Create a pipeline from a definition.
    pub fn from_definition(
        definition: &PipelineDefinition,
        store: Arc<dyn ResultStore>,
    ) -> Result<Self, PipelineError> {
        let mut pipeline = Pipeline::with_store(store);
        for component_def in &definition.components {
            pipeline.add_component(component_def.name.clone(), component_def.component.clone())?;
        }
        for connection in &definition.connections {
            pipeline.connect(
                &connection.start,
                &connection.end,
                connection.input_config.clone(),
            )?;
        }
        Ok(pipeline)
    }
}
