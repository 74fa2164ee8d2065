// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the hierarchical error system for the weir pipeline
//! domain. Every fallible operation in the workspace returns
//! [`PipelineError`], so callers can match on failure kinds without chasing
//! error types across crates.
//!
//! ## Error Categories
//!
//! ### Definition Errors
//! - **PipelineDefinition**: duplicate node names, unknown nodes in an edge,
//!   cycles, malformed input wiring
//! - **Validation**: missing required inputs, invalid source references,
//!   type mismatches between connected components
//! - **ComponentNotFound**: a reference to a component that is not part of
//!   the pipeline or the registry
//!
//! ### Execution Errors
//! - **ComponentExecution**: a component's `run` failed
//! - **StatusUpdate**: an illegal node status transition (e.g. a terminal
//!   status asked to move again)
//! - **MissingDependency**: a component declared dependencies the
//!   environment does not satisfy (reserved for component implementations;
//!   the engine itself never raises it)
//! - **Cancelled**: the driving task was cancelled mid-run
//!
//! ### Infrastructure Errors
//! - **KeyExists**: a store insert with `overwrite = false` hit an existing
//!   key; the only non-I/O store error
//! - **Store**: file system or backend failure inside a result store
//! - **Serialization**: JSON encoding or decoding failure
//! - **InvalidConfiguration**: malformed declarative configuration or
//!   trigger parameters
//! - **Scheduler**: a trigger could not be built or driven
//! - **Internal**: unexpected engine failure
//!
//! ## Recovery
//!
//! Store errors are the only kind worth retrying blindly: a failed run
//! leaves the previously committed state version intact, so the next
//! scheduled trigger firing retries the whole run from durable state.

use thiserror::Error;

/// Domain-specific errors for the pipeline engine.
///
/// Each variant carries a descriptive message. Variants map one-to-one to
/// the failure kinds surfaced at the engine boundary, so hosts can route
/// definition problems, execution problems, and infrastructure problems
/// differently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Invalid pipeline definition: {0}")]
    PipelineDefinition(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Component execution failed: {0}")]
    ComponentExecution(String),

    #[error("Invalid status transition: {0}")]
    StatusUpdate(String),

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Key already exists: {0}")]
    KeyExists(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Creates a new pipeline definition error
    pub fn definition(msg: impl Into<String>) -> Self {
        Self::PipelineDefinition(msg.into())
    }

    /// Creates a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a new component-not-found error
    pub fn component_not_found(msg: impl Into<String>) -> Self {
        Self::ComponentNotFound(msg.into())
    }

    /// Creates a new component execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::ComponentExecution(msg.into())
    }

    /// Creates a new status transition error
    pub fn status_update(msg: impl Into<String>) -> Self {
        Self::StatusUpdate(msg.into())
    }

    /// Creates a new store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Creates a new serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new scheduler error
    pub fn scheduler(msg: impl Into<String>) -> Self {
        Self::Scheduler(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Checks if the error is worth retrying on a later trigger firing
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::Store(_))
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}
