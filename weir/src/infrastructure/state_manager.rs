// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Versioned Component State
//!
//! Two-phase state management for pipeline components. Each run prepares a
//! pending version keyed by its run id, components stage their state in
//! memory during execution, and a successful run commits every staged
//! entry before flipping the `current_version` pointer. The pointer flip
//! is the commit: readers see either the old version or the new one, never
//! a partial one.
//!
//! A failed run discards the buffer and the previously committed version
//! stays visible. A crash between staging and commit has the same effect
//! because nothing durable changes until commit.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use weir_domain::error::PipelineError;
use weir_domain::repositories::{
    state_key, ResultStore, CURRENT_VERSION_KEY, PREVIOUS_VERSION_KEY,
};

#[derive(Debug, Default)]
struct StateInner {
    current_version: Option<String>,
    pending_version: Option<String>,
    pending_states: HashMap<String, Map<String, Value>>,
}

/// Manages versioned state for pipeline components.
///
/// Shared across concurrently executing node tasks; all mutation goes
/// through an internal async mutex.
pub struct StateManager {
    store: Arc<dyn ResultStore>,
    inner: Mutex<StateInner>,
}

impl StateManager {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self {
            store,
            inner: Mutex::new(StateInner::default()),
        }
    }

    /// Load the current state version pointer from the store.
    pub async fn initialize(&self) -> Result<(), PipelineError> {
        let version = self
            .store
            .get(CURRENT_VERSION_KEY)
            .await?
            .and_then(|v| v.as_str().map(str::to_string));
        match &version {
            Some(v) => debug!(version = %v, "initialized with state version"),
            None => debug!("no existing state version found"),
        }
        self.inner.lock().await.current_version = version;
        Ok(())
    }

    /// The version the next `get_component_state` call reads from.
    pub async fn current_version(&self) -> Option<String> {
        self.inner.lock().await.current_version.clone()
    }

    /// Get state for a component from the current version. Returns an
    /// empty map when no version has been committed yet.
    pub async fn get_component_state(
        &self,
        component: &str,
    ) -> Result<Map<String, Value>, PipelineError> {
        let version = match self.inner.lock().await.current_version.clone() {
            Some(v) => v,
            None => return Ok(Map::new()),
        };
        debug!(component, version = %version, "reading component state");
        match self.store.get(&state_key(&version, component)).await? {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(PipelineError::serialization(format!(
                "State for component '{component}' is not an object: {other}"
            ))),
            None => Ok(Map::new()),
        }
    }

    /// Prepare for a new state version identified by the run id.
    pub async fn prepare_new_version(&self, run_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.pending_version = Some(run_id.to_string());
        inner.pending_states.clear();
        debug!(run_id, "prepared new state version");
    }

    /// Stage component state for the pending version, in memory only.
    pub async fn stage_component_state(
        &self,
        component: &str,
        state: Map<String, Value>,
    ) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        if inner.pending_version.is_none() {
            return Err(PipelineError::internal(
                "Must call prepare_new_version before staging state",
            ));
        }
        inner.pending_states.insert(component.to_string(), state);
        Ok(())
    }

    /// Whether a component already staged state for the pending version.
    pub async fn is_staged(&self, component: &str) -> bool {
        self.inner.lock().await.pending_states.contains_key(component)
    }

    /// Commit the pending version: write every staged entry, then flip the
    /// previous/current pointers.
    pub async fn commit_version(&self) -> Result<(), PipelineError> {
        let (version, states, previous) = {
            let mut inner = self.inner.lock().await;
            let Some(version) = inner.pending_version.take() else {
                warn!("no pending state to commit");
                return Ok(());
            };
            if inner.pending_states.is_empty() {
                warn!("no staged component state to commit");
                return Ok(());
            }
            let states = std::mem::take(&mut inner.pending_states);
            let previous = inner.current_version.clone();
            (version, states, previous)
        };

        let staged = states.len();
        for (component, state) in states {
            self.store
                .add(&state_key(&version, &component), Value::Object(state), true)
                .await?;
        }

        self.store
            .add(CURRENT_VERSION_KEY, Value::String(version.clone()), true)
            .await?;
        self.store
            .add(
                PREVIOUS_VERSION_KEY,
                previous.clone().map(Value::String).unwrap_or(Value::Null),
                true,
            )
            .await?;

        info!(version = %version, components = staged, "committed state version");
        self.inner.lock().await.current_version = Some(version);
        Ok(())
    }

    /// Discard pending state changes without any writes.
    pub async fn discard_pending(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(version) = inner.pending_version.take() {
            info!(version = %version, "discarded pending state version");
            inner.pending_states.clear();
        }
    }
}
