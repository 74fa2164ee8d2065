// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Weir Domain
//!
//! The domain layer of the weir incremental pipeline engine: pure business
//! logic with no runtime, storage, or scheduling concerns. The engine crate
//! (`weir`) builds its executor, stores, and triggers on top of these
//! contracts.
//!
//! ## Module Structure
//!
//! - [`error`]: the single [`PipelineError`](error::PipelineError) enum
//!   every fallible operation in the workspace returns
//! - [`models`]: items, groups, and metadata records flowing between
//!   components
//! - [`component`]: the component contract: explicit input/output
//!   descriptors, type tags, the async `run` interface, and the per-node
//!   status machine
//! - [`graph`]: the typed DAG container with cycle detection and
//!   topology queries
//! - [`delta`]: the ADD/UPDATE/DELETE operation log, canonical content
//!   hashing, diff computation, and the incremental merge rules for
//!   derived aggregates
//! - [`repositories`]: the async result-store port and its key scheme
//! - [`ports`]: contracts of external collaborators (harvesters,
//!   groupers, metadata builders, catalogers)
//!
//! ## Design Notes
//!
//! Components do not reflect over function signatures the way a dynamic
//! language would; they expose a
//! [`ComponentDescriptor`](component::ComponentDescriptor) that the graph
//! validator checks statically before any run starts. Values flowing
//! between nodes are field-keyed JSON documents, so field-qualified input
//! wiring is a plain map lookup.

pub mod component;
pub mod delta;
pub mod error;
pub mod graph;
pub mod models;
pub mod ports;
pub mod repositories;

// Re-export commonly used types for convenient access
pub use component::{
    Component, ComponentDescriptor, ComponentInput, ComponentOutput, RunStatus, TypeTag,
};
pub use delta::{Operation, OperationType};
pub use error::PipelineError;
pub use models::{CommonMetadata, Group, Item, TimeFrame};
pub use repositories::ResultStore;
