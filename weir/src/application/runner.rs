// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Runner
//!
//! Turns a declarative configuration into a validated, runnable pipeline
//! and exposes a single `run` entry point. The runner owns the pipeline
//! behind an async mutex, so schedulers and hosts share it through an
//! `Arc` and successive invocations of one runner are serialized; hosts
//! that want overlapping runs create independent runners over the same
//! store.
//!
//! Pre-configured `run_params_` from the config are merged into every
//! invocation's inputs, with user-supplied values winning per parameter.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use weir_domain::error::PipelineError;
use weir_domain::repositories::ResultStore;

use crate::infrastructure::config::{ComponentRegistry, PipelineConfig};
use crate::infrastructure::scheduler::Scheduler;

use super::pipeline::{Pipeline, PipelineDefinition, PipelineResult, RuntimeInputs};

/// Runner to execute pipelines built from definitions or configs.
pub struct PipelineRunner {
    pipeline: Mutex<Pipeline>,
    run_params: RuntimeInputs,
    scheduler_config: Option<crate::infrastructure::scheduler::SchedulerConfig>,
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("run_params", &self.run_params)
            .field("scheduler_config", &self.scheduler_config)
            .finish_non_exhaustive()
    }
}

impl PipelineRunner {
    /// Build and validate a pipeline from an in-memory definition.
    pub fn from_definition(
        definition: &PipelineDefinition,
        store: Arc<dyn ResultStore>,
    ) -> Result<Self, PipelineError> {
        let mut pipeline = Pipeline::from_definition(definition, store)?;
        pipeline.validate()?;
        Ok(Self {
            pipeline: Mutex::new(pipeline),
            run_params: definition.run_params(),
            scheduler_config: None,
        })
    }

    /// Bind a declarative config: instantiate components through the
    /// registry, wire the connections (template-provided or explicit),
    /// and validate the result.
    pub fn from_config(
        config: &PipelineConfig,
        registry: &ComponentRegistry,
        store: Arc<dyn ResultStore>,
    ) -> Result<Self, PipelineError> {
        let definition = config.parse(registry)?;
        let mut runner = Self::from_definition(&definition, store)?;
        runner.scheduler_config = config.scheduler.clone();
        Ok(runner)
    }

    /// Run the pipeline with the given input merged over the configured
    /// run parameters.
    pub async fn run(&self, user_input: RuntimeInputs) -> Result<PipelineResult, PipelineError> {
        let inputs = merge_inputs(&self.run_params, user_input);
        self.pipeline.lock().await.run(inputs).await
    }

    /// Build the configured trigger around this runner, if the config
    /// declared one.
    pub fn scheduler(
        self: &Arc<Self>,
        inputs: RuntimeInputs,
    ) -> Result<Option<Box<dyn Scheduler>>, PipelineError> {
        match &self.scheduler_config {
            Some(config) => Ok(Some(config.build(self.clone(), inputs)?)),
            None => Ok(None),
        }
    }

    /// Access the underlying pipeline, e.g. for status queries.
    pub async fn with_pipeline<R>(&self, f: impl FnOnce(&Pipeline) -> R) -> R {
        f(&*self.pipeline.lock().await)
    }
}

/// Overlay user input onto configured defaults, per component and per
/// parameter.
fn merge_inputs(defaults: &RuntimeInputs, user: RuntimeInputs) -> RuntimeInputs {
    let mut merged = defaults.clone();
    for (component, value) in user {
        match value {
            Value::Object(overlay) => match merged.get_mut(&component) {
                Some(Value::Object(base)) => {
                    base.extend(overlay);
                }
                _ => {
                    merged.insert(component, Value::Object(overlay));
                }
            },
            other => {
                merged.insert(component, other);
            }
        }
    }
    merged
}
