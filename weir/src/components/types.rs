// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Typed output payloads of the built-in components. Each record
//! serializes to the field-keyed object the engine persists as the node
//! result, so downstream wiring addresses fields by name
//! (`harvester.items`, `grouper.groups`, ...).

use serde::{Deserialize, Serialize};

use weir_domain::component::ComponentOutput;
use weir_domain::delta::Operation;
use weir_domain::error::PipelineError;
use weir_domain::models::{CommonMetadata, Group, Item};

/// Output of a source component: the current observation plus the
/// operation log describing changes since the previous run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Items {
    pub items: Vec<Item>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl Items {
    pub fn into_output(self) -> Result<ComponentOutput, PipelineError> {
        ComponentOutput::from_record(&self)
    }
}

/// Output of a grouping component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Groups {
    pub groups: Vec<Group>,
}

impl Groups {
    pub fn into_output(self) -> Result<ComponentOutput, PipelineError> {
        ComponentOutput::from_record(&self)
    }
}

/// Output of a metadata enricher: one service-level record plus one record
/// per group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub service_metadata: CommonMetadata,
    pub group_metadata: Vec<CommonMetadata>,
}

impl Metadata {
    pub fn into_output(self) -> Result<ComponentOutput, PipelineError> {
        ComponentOutput::from_record(&self)
    }
}

/// Output of a catalog sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogerStatus {
    pub success: bool,
    pub groups: Vec<String>,
}

impl CatalogerStatus {
    pub fn into_output(self) -> Result<ComponentOutput, PipelineError> {
        ComponentOutput::from_record(&self)
    }
}
