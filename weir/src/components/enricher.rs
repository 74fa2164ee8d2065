// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Metadata enricher component: builds one service-level metadata record
//! over the full item set and one record per group, delegating the actual
//! construction to a [`MetadataBuilder`] port.

use std::sync::Arc;

use async_trait::async_trait;

use weir_domain::component::{
    Component, ComponentDescriptor, ComponentInput, ComponentOutput, TypeTag,
};
use weir_domain::error::PipelineError;
use weir_domain::models::{Group, Item};
use weir_domain::ports::MetadataBuilder;

use super::types::Metadata;

/// Component wrapping any metadata builder.
pub struct EnricherComponent {
    builder: Arc<dyn MetadataBuilder>,
}

impl EnricherComponent {
    pub fn new(builder: Arc<dyn MetadataBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Component for EnricherComponent {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::builder()
            .input("items", TypeTag::sequence(TypeTag::Item))
            .input("groups", TypeTag::sequence(TypeTag::Group))
            .optional_input("operations", TypeTag::sequence(TypeTag::Operation))
            .output("service_metadata", TypeTag::Metadata)
            .output("group_metadata", TypeTag::sequence(TypeTag::Metadata))
            .build()
    }

    async fn run(&self, input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
        let items: Vec<Item> = input.require("items")?;
        let groups: Vec<Group> = input.require("groups")?;

        let service_metadata = self.builder.build_service_metadata(&items).await?;
        let mut group_metadata = Vec::with_capacity(groups.len());
        for group in &groups {
            group_metadata.push(self.builder.build_group_metadata(group).await?);
        }

        Metadata {
            service_metadata,
            group_metadata,
        }
        .into_output()
    }
}
