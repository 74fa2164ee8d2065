// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Grouper Component
//!
//! Derived component that maintains a grouped view of the item stream and
//! updates it incrementally from the operation log. The full merged group
//! set lives in versioned state under `previous_groups`; each run emits
//! only the groups the current operations touched, so downstream
//! components process deltas instead of the whole world.
//!
//! Behavior by case:
//!
//! - first run (no prior groups): group all items, emit everything;
//! - empty operation list: emit zero groups, keep the prior state;
//! - otherwise: regroup added and updated items, merge the result into the
//!   prior set, drop deleted items from every group, emit exactly the
//!   touched groups, and stage the full merged set.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use tracing::{debug, info};

use weir_domain::component::{
    Component, ComponentDescriptor, ComponentInput, ComponentOutput, TypeTag,
};
use weir_domain::delta::{merge_groups, partition_operations, remove_items, Operation};
use weir_domain::error::PipelineError;
use weir_domain::models::{Group, Item};
use weir_domain::ports::Grouper;

use super::types::Groups;

/// Key of the prior group set within this component's state.
pub const PREVIOUS_GROUPS_KEY: &str = "previous_groups";

/// Grouping component that applies operations to its prior emission.
pub struct GrouperComponent {
    grouper: Arc<dyn Grouper>,
}

impl GrouperComponent {
    pub fn new(grouper: Arc<dyn Grouper>) -> Self {
        Self { grouper }
    }

    fn staged(groups: &[Group]) -> Result<Map<String, serde_json::Value>, PipelineError> {
        let mut state = Map::new();
        state.insert(
            PREVIOUS_GROUPS_KEY.to_string(),
            serde_json::to_value(groups)?,
        );
        Ok(state)
    }
}

#[async_trait]
impl Component for GrouperComponent {
    fn descriptor(&self) -> ComponentDescriptor {
        ComponentDescriptor::builder()
            .input("items", TypeTag::sequence(TypeTag::Item))
            .optional_input("operations", TypeTag::sequence(TypeTag::Operation))
            .output("groups", TypeTag::sequence(TypeTag::Group))
            .consumes_state()
            .build()
    }

    async fn run(&self, input: ComponentInput) -> Result<ComponentOutput, PipelineError> {
        let items: Vec<Item> = input.require("items")?;
        let operations: Vec<Operation> = input.optional("operations")?;
        let previous_groups: Option<Vec<Group>> = input.state_entry(PREVIOUS_GROUPS_KEY)?;

        let Some(previous) = previous_groups else {
            // First run, group the full item set.
            let groups = self.grouper.group_items(&items).await?;
            info!(groups = groups.len(), "initial grouping over all items");
            let state = Self::staged(&groups)?;
            return Ok(Groups { groups }.into_output()?.with_state(state));
        };

        if operations.is_empty() {
            debug!("no operations, emitting no groups");
            let state = Self::staged(&previous)?;
            return Ok(Groups { groups: vec![] }.into_output()?.with_state(state));
        }

        let parts = partition_operations(&operations);
        let mut merged = previous;
        let mut touched: Vec<String> = Vec::new();

        if !parts.added.is_empty() || !parts.updated.is_empty() {
            let mut regroup_input = parts.added.clone();
            regroup_input.extend(parts.updated.iter().cloned());
            let new_groups = self.grouper.group_items(&regroup_input).await?;
            touched.extend(merge_groups(&mut merged, new_groups));
        }
        if !parts.deleted.is_empty() {
            touched.extend(remove_items(&mut merged, &parts.deleted));
        }

        touched.sort();
        touched.dedup();

        // Emit the post-merge version of every touched group.
        let emitted: Vec<Group> = merged
            .iter()
            .filter(|g| touched.binary_search(&g.name).is_ok())
            .cloned()
            .collect();

        info!(
            touched = emitted.len(),
            total = merged.len(),
            "applied operations to prior groups"
        );
        let state = Self::staged(&merged)?;
        Ok(Groups { groups: emitted }.into_output()?.with_state(state))
    }
}
