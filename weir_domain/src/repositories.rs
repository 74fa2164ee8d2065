// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Result Store Port
//!
//! The keyed persistence abstraction the engine writes results, statuses,
//! run history, and versioned state through. Implementations live in the
//! infrastructure layer; the domain only fixes the contract and the key
//! scheme.
//!
//! ## Key scheme
//!
//! | Key | Holds |
//! |-----|-------|
//! | `<run_id>:<component>` | a component's serialized result for one run |
//! | `<run_id>:<component>:status` | the component's status string |
//! | `pipeline:run_history` | the serialized run log |
//! | `pipeline:state:current_version` | pointer to the active state version |
//! | `pipeline:state:previous_version` | pointer to the prior state version |
//! | `state:v<version>:<component>` | one component's state in one version |
//!
//! All operations on one store instance are serialized, observable as if
//! under a single mutex. Inserting with `overwrite = false` onto an
//! existing key fails with `KeyExists`; that is the only non-I/O error
//! kind.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PipelineError;

/// Key under which the serialized run log is stored.
pub const RUN_HISTORY_KEY: &str = "pipeline:run_history";
/// Pointer key for the active state version.
pub const CURRENT_VERSION_KEY: &str = "pipeline:state:current_version";
/// Pointer key for the superseded state version.
pub const PREVIOUS_VERSION_KEY: &str = "pipeline:state:previous_version";

/// Create a standardized key for storing component results.
pub fn result_key(run_id: &str, component: &str) -> String {
    format!("{run_id}:{component}")
}

/// Create a standardized key for storing component statuses.
pub fn status_key(run_id: &str, component: &str) -> String {
    format!("{run_id}:{component}:status")
}

/// Create the key of one component's entry in a state version.
pub fn state_key(version: &str, component: &str) -> String {
    format!("state:v{version}:{component}")
}

/// Asynchronous keyed store of opaque JSON values.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Store a value with the given key.
    async fn add(&self, key: &str, value: Value, overwrite: bool) -> Result<(), PipelineError>;

    /// Retrieve a value by key.
    async fn get(&self, key: &str) -> Result<Option<Value>, PipelineError>;

    /// Delete a value by key.
    async fn delete(&self, key: &str) -> Result<(), PipelineError>;

    /// List all stored keys.
    async fn list_keys(&self) -> Result<Vec<String>, PipelineError>;

    /// Store the result of a component in a particular run.
    async fn add_result_for_component(
        &self,
        run_id: &str,
        component: &str,
        result: Value,
        overwrite: bool,
    ) -> Result<(), PipelineError> {
        self.add(&result_key(run_id, component), result, overwrite)
            .await
    }

    /// Get the result of a component in a particular run.
    async fn get_result_for_component(
        &self,
        run_id: &str,
        component: &str,
    ) -> Result<Option<Value>, PipelineError> {
        self.get(&result_key(run_id, component)).await
    }

    /// Store the status of a component in a particular run.
    async fn add_status_for_component(
        &self,
        run_id: &str,
        component: &str,
        status: &str,
    ) -> Result<(), PipelineError> {
        self.add(&status_key(run_id, component), Value::String(status.into()), true)
            .await
    }

    /// Get the status of a component in a particular run.
    async fn get_status_for_component(
        &self,
        run_id: &str,
        component: &str,
    ) -> Result<Option<String>, PipelineError> {
        Ok(self
            .get(&status_key(run_id, component))
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }
}
