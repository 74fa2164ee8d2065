// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Harvester Component
//!
//! Source component that turns any [`Harvester`] port into an incremental
//! pipeline source. It keeps the previously observed item set in versioned
//! state under `previous_items` and emits the operation log describing
//! what changed since the last committed run.
//!
//! When a prior observation exists and nothing changed, the component sets
//! `stop_pipeline` so the engine short-circuits the run; the unchanged
//! observation is still staged, which keeps commit idempotent for
//! consumers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use tracing::{debug, info};

use weir_domain::component::{
    Component, ComponentDescriptor, ComponentInput, ComponentOutput, TypeTag,
};
use weir_domain::delta::{detect_operations, Operation};
use weir_domain::error::PipelineError;
use weir_domain::models::Item;
use weir_domain::ports::Harvester;

use super::types::Items;

/// Key of the prior observation within this component's state.
pub const PREVIOUS_ITEMS_KEY: &str = "previous_items";

/// Source component that detects operations by comparing with the
/// previous committed observation.
pub struct HarvesterComponent {
    harvester: Arc<dyn Harvester>,
}

impl HarvesterComponent {
    pub fn new(harvester: Arc<dyn Harvester>) -> Self {
        Self { harvester }
    }
}

#[async_trait]
impl Component for HarvesterComponent {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::builder()
            .output("items", TypeTag::sequence(TypeTag::Item))
            .output("operations", TypeTag::sequence(TypeTag::Operation))
            .consumes_state()
            .build()
    }

    async fn run(&self, input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
        let previous_items: Option<Vec<Item>> = input.state_entry(PREVIOUS_ITEMS_KEY)?;
        let current_items = self.harvester.fetch_items().await?;

        let mut stop_pipeline = false;
        let operations: Vec<Operation> = match previous_items {
            Some(previous) => {
                debug!(
                    current = current_items.len(),
                    previous = previous.len(),
                    "comparing current observation with previous observation"
                );
                let operations = detect_operations(&previous, &current_items);
                info!(changes = operations.len(), "detected changes");
                if operations.is_empty() {
                    info!("no new or updated items discovered, stopping pipeline");
                    stop_pipeline = true;
                }
                operations
            }
            None => {
                // First run, treat every current item as an addition.
                info!(items = current_items.len(), "first run, treating all items as new");
                current_items.iter().cloned().map(Operation::add).collect()
            }
        };

        let mut state = Map::new();
        state.insert(
            PREVIOUS_ITEMS_KEY.to_string(),
            serde_json::to_value(&current_items)?,
        );

        Ok(Items {
            items: current_items,
            operations,
        }
        .into_output()?
        .with_state(state)
        .with_stop_pipeline(stop_pipeline))
    }
}
