// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Run History Tracker
//!
//! Append-only history of pipeline runs for observability: start and end
//! times, final status, per-component statuses and performance, and the
//! sanitized inputs the run was invoked with. The history is loaded from
//! the result store on first use and the full list is re-serialized on
//! every mutation, so the on-disk log is always a valid JSON document.
//!
//! Inputs are sanitized before recording: values whose key looks like a
//! credential are redacted, never persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use weir_domain::error::PipelineError;
use weir_domain::repositories::{ResultStore, RUN_HISTORY_KEY};

/// Final status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineRunStatus {
    Started,
    Completed,
    Failed,
    Stopped,
}

/// Performance record for a single component execution.
///
/// Memory columns are optional; the engine itself only measures wall-clock
/// time and leaves memory accounting to hosts that can provide it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPerformanceRecord {
    pub component_name: String,
    pub execution_time_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_peak_mb: Option<f64>,
}

/// Record of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub status: PipelineRunStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,

    /// Component name -> final status string.
    #[serde(default)]
    pub component_statuses: Map<String, Value>,
    /// High-level inputs, sanitized before recording.
    #[serde(default)]
    pub inputs: Map<String, Value>,

    /// Component name -> performance record.
    #[serde(default)]
    pub component_performance: std::collections::BTreeMap<String, ComponentPerformanceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_execution_time_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_memory_peak_mb: Option<f64>,
}

/// Redact input values whose key suggests a credential.
///
/// Matching is substring-based over lowercased keys and applies
/// recursively to nested objects.
pub fn sanitize_inputs(inputs: &Map<String, Value>) -> Map<String, Value> {
    const SENSITIVE: [&str; 5] = ["password", "secret", "token", "api_key", "credential"];
    inputs
        .iter()
        .map(|(key, value)| {
            let lowered = key.to_lowercase();
            let sanitized = if SENSITIVE.iter().any(|s| lowered.contains(s)) {
                Value::String("***".to_string())
            } else if let Value::Object(nested) = value {
                Value::Object(sanitize_inputs(nested))
            } else {
                value.clone()
            };
            (key.clone(), sanitized)
        })
        .collect()
}

/// Tracks all pipeline runs for observability.
pub struct RunTracker {
    store: Arc<dyn ResultStore>,
    records: Mutex<Option<Vec<RunRecord>>>,
}

impl RunTracker {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self {
            store,
            records: Mutex::new(None),
        }
    }

    async fn load_if_needed(
        &self,
        records: &mut Option<Vec<RunRecord>>,
    ) -> Result<(), PipelineError> {
        if records.is_some() {
            return Ok(());
        }
        let loaded: Vec<RunRecord> = match self.store.get(RUN_HISTORY_KEY).await? {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        debug!(runs = loaded.len(), "loaded run history");
        *records = Some(loaded);
        Ok(())
    }

    async fn save(&self, records: &[RunRecord]) -> Result<(), PipelineError> {
        self.store
            .add(RUN_HISTORY_KEY, serde_json::to_value(records)?, true)
            .await
    }

    /// Record the start of a pipeline run.
    pub async fn record_run_start(
        &self,
        run_id: &str,
        inputs: Map<String, Value>,
    ) -> Result<(), PipelineError> {
        let mut guard = self.records.lock().await;
        self.load_if_needed(&mut guard).await?;
        let records = guard.as_mut().expect("history loaded");
        records.push(RunRecord {
            run_id: run_id.to_string(),
            status: PipelineRunStatus::Started,
            start_time: Utc::now(),
            end_time: None,
            error: None,
            component_statuses: Map::new(),
            inputs: sanitize_inputs(&inputs),
            component_performance: Default::default(),
            total_execution_time_seconds: None,
            pipeline_memory_peak_mb: None,
        });
        self.save(records).await
    }

    /// Record successful completion of a run.
    pub async fn record_run_completion(
        &self,
        run_id: &str,
        stopped_early: bool,
    ) -> Result<(), PipelineError> {
        self.update_record(run_id, |record| {
            record.status = if stopped_early {
                PipelineRunStatus::Stopped
            } else {
                PipelineRunStatus::Completed
            };
            let end = Utc::now();
            record.total_execution_time_seconds =
                Some((end - record.start_time).num_milliseconds() as f64 / 1000.0);
            record.end_time = Some(end);
        })
        .await
    }

    /// Record failure of a run.
    pub async fn record_run_failure(
        &self,
        run_id: &str,
        error: &str,
    ) -> Result<(), PipelineError> {
        self.update_record(run_id, |record| {
            record.status = PipelineRunStatus::Failed;
            record.end_time = Some(Utc::now());
            record.error = Some(error.to_string());
        })
        .await
    }

    /// Record performance metrics for one component execution.
    pub async fn record_component_performance(
        &self,
        run_id: &str,
        metrics: ComponentPerformanceRecord,
    ) -> Result<(), PipelineError> {
        self.update_record(run_id, |record| {
            record
                .component_performance
                .insert(metrics.component_name.clone(), metrics);
        })
        .await
    }

    /// Record the final status of one component in a run.
    pub async fn record_component_status(
        &self,
        run_id: &str,
        component: &str,
        status: &str,
    ) -> Result<(), PipelineError> {
        self.update_record(run_id, |record| {
            record
                .component_statuses
                .insert(component.to_string(), Value::String(status.to_string()));
        })
        .await
    }

    async fn update_record(
        &self,
        run_id: &str,
        mutate: impl FnOnce(&mut RunRecord),
    ) -> Result<(), PipelineError> {
        let mut guard = self.records.lock().await;
        self.load_if_needed(&mut guard).await?;
        let records = guard.as_mut().expect("history loaded");
        if let Some(record) = records.iter_mut().find(|r| r.run_id == run_id) {
            mutate(record);
            self.save(records).await?;
        }
        Ok(())
    }

    /// Get the most recent run records, newest first.
    pub async fn get_run_records(&self, limit: usize) -> Result<Vec<RunRecord>, PipelineError> {
        let mut guard = self.records.lock().await;
        self.load_if_needed(&mut guard).await?;
        let mut records = guard.as_ref().expect("history loaded").clone();
        records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        records.truncate(limit);
        Ok(records)
    }

    /// Get the most recent successfully completed run.
    pub async fn get_last_successful_run(&self) -> Result<Option<RunRecord>, PipelineError> {
        Ok(self
            .get_run_records(usize::MAX)
            .await?
            .into_iter()
            .find(|r| r.status == PipelineRunStatus::Completed))
    }
}
