// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Data Models
//!
//! Core value objects that flow between pipeline components: the opaque
//! [`Item`] unit of work, named [`Group`]s of items, and the common
//! metadata record exchanged with enrichers and catalogers.
//!
//! Items are immutable within a run; equality of item *content* is defined
//! by the canonical hash in [`crate::delta`], not by this module.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque unit of work flowing between components.
///
/// The `id` is stable across runs and is the key the delta protocol diffs
/// on. `content` is an arbitrary structured value the engine never
/// interprets beyond hashing it for change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub content: Value,
}

impl Item {
    pub fn new(id: impl Into<String>, content: Value) -> Self {
        Self {
            id: id.into(),
            content,
        }
    }
}

/// A named collection of items with a set of parent-class tags.
///
/// `items` keeps insertion order; consumers may observe it. `name` is
/// unique within a single emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub parent_classes: BTreeSet<String>,
}

impl Group {
    pub fn new(name: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            name: name.into(),
            items,
            parent_classes: BTreeSet::new(),
        }
    }

    /// Looks up an item position by id.
    pub fn position_of(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == item_id)
    }
}

/// Temporal extent of a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeFrame {
    pub start_time: DateTime<Utc>,
    pub latest_time: DateTime<Utc>,
}

/// Extensible common metadata format produced by enrichers and consumed by
/// catalogers. The engine treats it as an opaque payload; only sinks and
/// enricher ports interpret the fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonMetadata {
    // required fields
    pub identifier: String,
    pub title: String,
    pub description: String,
    pub endpoint_url: String,

    // standard, but optional fields
    #[serde(default)]
    pub spatial_extent: String,
    #[serde(default)]
    pub temporal_extent: Option<TimeFrame>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,

    // data quality and provenance
    pub source_type: String,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_frequency: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,

    // license and access information
    #[serde(default)]
    pub license: Option<String>,
}
