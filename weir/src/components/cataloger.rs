// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Catalog sink component: registers enriched metadata with an external
//! catalog through a [`Cataloger`] port and reports which entries the
//! catalog now manages. A failing registration fails the node, and with it
//! the run; results already written by upstream nodes stay in the store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use weir_domain::component::{
    Component, ComponentDescriptor, ComponentInput, ComponentOutput, TypeTag,
};
use weir_domain::error::PipelineError;
use weir_domain::models::CommonMetadata;
use weir_domain::ports::Cataloger;

use super::types::CatalogerStatus;

/// Component wrapping any catalog sink.
pub struct CatalogerComponent {
    cataloger: Arc<dyn Cataloger>,
}

impl CatalogerComponent {
    pub fn new(cataloger: Arc<dyn Cataloger>) -> Self {
        Self { cataloger }
    }
}

#[async_trait]
impl Component for CatalogerComponent {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::builder()
            .input("service_metadata", TypeTag::Metadata)
            .input("group_metadata", TypeTag::sequence(TypeTag::Metadata))
            .output("success", TypeTag::Bool)
            .output("groups", TypeTag::sequence(TypeTag::Text))
            .build()
    }

    async fn run(&self, input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
        let service_metadata: CommonMetadata = input.require("service_metadata")?;
        let group_metadata: Vec<CommonMetadata> = input.require("group_metadata")?;

        let managed = self
            .cataloger
            .register(&service_metadata, &group_metadata)
            .await?;
        info!(entries = managed.len(), "registered catalog entries");

        CatalogerStatus {
            success: true,
            groups: managed,
        }
        .into_output()
    }
}
