// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Weir
//!
//! An incremental, schedulable DAG execution engine for data-integration
//! pipelines. A pipeline is a user-declared graph of components (the
//! common shape is harvester -> grouper -> enricher -> cataloger, but the
//! engine is domain-neutral); each run observes what changed since the
//! previous run and propagates only the deltas downstream.
//!
//! ## What the engine provides
//!
//! - **Graph model and validation**: typed nodes and input wiring, cycle
//!   detection, descriptor-based type checking, and required-input
//!   coverage analysis before any run starts.
//! - **Concurrent run engine**: every node executes as a tokio task in
//!   topological order, driven by a per-node status machine persisted in
//!   the result store.
//! - **Incremental change detection**: an ordered ADD/UPDATE/DELETE
//!   operation log produced by sources and folded into derived aggregates
//!   downstream, with canonical content hashing for equality.
//! - **Versioned state with two-phase commit**: components stage state
//!   during a run; a successful run commits the whole version atomically
//!   via a pointer flip, so a crash or failure never exposes a partial
//!   version.
//! - **Run history**: an append-only log of runs with timings,
//!   per-component statuses and performance, and sanitized inputs.
//! - **Triggers**: interval and cron schedulers that repeatedly invoke a
//!   runner, plus declarative config binding with a component registry.
//!
//! ## Quick tour
//!
//! ```no_run
//! use std::sync::Arc;
//! use weir::application::pipeline::Pipeline;
//! use weir::infrastructure::stores::FileStore;
//!
//! # async fn demo(harvester: Arc<dyn weir_domain::component::Component>,
//! #               grouper: Arc<dyn weir_domain::component::Component>)
//! #               -> Result<(), weir_domain::error::PipelineError> {
//! let store = Arc::new(FileStore::new(".pipeline_store")?);
//! let mut pipeline = Pipeline::with_store(store);
//! pipeline.add_component("harvester", harvester)?;
//! pipeline.add_component("grouper", grouper)?;
//! pipeline.connect("harvester", "grouper", [
//!     ("items".to_string(), "harvester.items".to_string()),
//!     ("operations".to_string(), "harvester.operations".to_string()),
//! ].into())?;
//!
//! let result = pipeline.run(Default::default()).await?;
//! println!("run {} finished: success={}", result.run_id, result.success);
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod components;
pub mod infrastructure;

// Re-export the domain crate so hosts depend on one name
pub use weir_domain as domain;

pub use application::pipeline::{Pipeline, PipelineResult, RuntimeInputs};
pub use application::runner::PipelineRunner;
pub use infrastructure::config::{ComponentRegistry, PipelineConfig};
pub use infrastructure::run_tracker::{PipelineRunStatus, RunRecord, RunTracker};
pub use infrastructure::scheduler::{Scheduler, SchedulerConfig};
pub use infrastructure::state_manager::StateManager;
pub use infrastructure::stores::{FileStore, InMemoryStore};
