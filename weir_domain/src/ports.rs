// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # External Collaborator Ports
//!
//! Narrow interfaces to the domain code the engine orchestrates but never
//! implements: source adapters that fetch observations, grouping logic,
//! metadata construction, and catalog sinks. Concrete implementations
//! (HTTP clients, classifiers, catalog REST adapters) live outside this
//! workspace; the component library in the engine crate wraps these ports
//! into schedulable pipeline components.
//!
//! All ports are async: every real implementation crosses an I/O boundary.

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::models::{CommonMetadata, Group, Item};

/// A source adapter that returns the current observation of its upstream
/// system. Change detection against previous observations is the wrapping
/// component's job, not the harvester's.
#[async_trait]
pub trait Harvester: Send + Sync {
    async fn fetch_items(&self) -> Result<Vec<Item>, PipelineError>;
}

/// Grouping logic that partitions items into named groups.
#[async_trait]
pub trait Grouper: Send + Sync {
    async fn group_items(&self, items: &[Item]) -> Result<Vec<Group>, PipelineError>;
}

/// Builds service-level and per-group metadata records.
#[async_trait]
pub trait MetadataBuilder: Send + Sync {
    async fn build_service_metadata(&self, items: &[Item])
        -> Result<CommonMetadata, PipelineError>;

    async fn build_group_metadata(&self, group: &Group) -> Result<CommonMetadata, PipelineError>;
}

/// A catalog sink that registers metadata records and returns the
/// identifiers of the entries it managed.
#[async_trait]
pub trait Cataloger: Send + Sync {
    async fn register(
        &self,
        service: &CommonMetadata,
        groups: &[CommonMetadata],
    ) -> Result<Vec<String>, PipelineError>;
}
