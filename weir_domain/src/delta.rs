// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Delta Protocol
//!
//! The ordered operation log that source components emit and derived
//! components consume. A source diffs its current observation against the
//! one committed by the previous run and emits one [`Operation`] per
//! changed item; a derived component folds those operations into the
//! aggregate it maintains in versioned state.
//!
//! ## Invariants
//!
//! - At most one operation per `item_id` per emission. An add-then-update
//!   within one run is not representable; sources must coalesce upstream.
//! - Operations are applied in emission order, but the merge rules are
//!   commutative, so the final group state is order-independent.
//! - Content equality is decided by [`canonical_hash`]: maps are
//!   serialized with recursively sorted keys before hashing, so key order
//!   never produces a phantom update.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::{Group, Item};

/// Kind of change an operation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Add,
    Update,
    Delete,
}

/// A record of change against a single item.
///
/// `item` carries the full current value; for deletes it carries the
/// last-known value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub op: OperationType,
    pub item_id: String,
    pub item: Item,
}

impl Operation {
    pub fn add(item: Item) -> Self {
        Self {
            op: OperationType::Add,
            item_id: item.id.clone(),
            item,
        }
    }

    pub fn update(item: Item) -> Self {
        Self {
            op: OperationType::Update,
            item_id: item.id.clone(),
            item,
        }
    }

    pub fn delete(item: Item) -> Self {
        Self {
            op: OperationType::Delete,
            item_id: item.id.clone(),
            item,
        }
    }
}

/// Canonical content hash for change detection.
///
/// The value is serialized with all object keys recursively sorted, then
/// hashed with SHA-256. Hash equality defines content equality for the
/// purposes of the delta protocol.
pub fn canonical_hash(content: &Value) -> String {
    let mut hasher = Sha256::new();
    hash_value(content, &mut hasher);
    hex::encode(hasher.finalize())
}

fn hash_value(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Object(map) => {
            hasher.update(b"{");
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            for key in keys {
                hasher.update(key.as_bytes());
                hasher.update(b":");
                hash_value(&map[key], hasher);
                hasher.update(b",");
            }
            hasher.update(b"}");
        }
        Value::Array(values) => {
            hasher.update(b"[");
            for value in values {
                hash_value(value, hasher);
                hasher.update(b",");
            }
            hasher.update(b"]");
        }
        // scalar serialization is already canonical
        other => hasher.update(other.to_string().as_bytes()),
    }
}

/// Detect changes between the previous and current item sets.
///
/// Adds come first in current-set order, then updates (ids present in both
/// sets whose content hashes differ) in current-set order, then deletes in
/// previous-set order. Each item id appears at most once.
pub fn detect_operations(previous: &[Item], current: &[Item]) -> Vec<Operation> {
    let prev_map: HashMap<&str, &Item> = previous.iter().map(|i| (i.id.as_str(), i)).collect();
    let curr_ids: HashSet<&str> = current.iter().map(|i| i.id.as_str()).collect();

    let prev_hashes: HashMap<&str, String> = prev_map
        .iter()
        .map(|(id, item)| (*id, canonical_hash(&item.content)))
        .collect();

    let mut operations = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    // Additions and updates, in current order
    for item in current {
        if !seen.insert(item.id.as_str()) {
            continue;
        }
        match prev_hashes.get(item.id.as_str()) {
            None => operations.push(Operation::add(item.clone())),
            Some(prev_hash) => {
                if *prev_hash != canonical_hash(&item.content) {
                    operations.push(Operation::update(item.clone()));
                }
            }
        }
    }

    // Deletions, in previous order
    for item in previous {
        if !curr_ids.contains(item.id.as_str()) && seen.insert(item.id.as_str()) {
            operations.push(Operation::delete(item.clone()));
        }
    }

    operations
}

/// Operations split by type, preserving emission order within each bucket.
#[derive(Debug, Default)]
pub struct PartitionedOperations {
    pub added: Vec<Item>,
    pub updated: Vec<Item>,
    pub deleted: Vec<Item>,
}

pub fn partition_operations(operations: &[Operation]) -> PartitionedOperations {
    let mut parts = PartitionedOperations::default();
    for op in operations {
        match op.op {
            OperationType::Add => parts.added.push(op.item.clone()),
            OperationType::Update => parts.updated.push(op.item.clone()),
            OperationType::Delete => parts.deleted.push(op.item.clone()),
        }
    }
    parts
}

/// Merge freshly computed groups into the prior group set.
///
/// For each new group: if a prior group shares its name, every item of the
/// new group replaces the prior entry with the same id or is appended, and
/// parent classes are merged by set union. Groups with unseen names are
/// appended as-is. Returns the names of groups that were created or
/// changed.
pub fn merge_groups(existing: &mut Vec<Group>, new_groups: Vec<Group>) -> Vec<String> {
    let mut touched = Vec::new();
    for new_group in new_groups {
        match existing.iter_mut().find(|g| g.name == new_group.name) {
            Some(group) => {
                for item in new_group.items {
                    match group.position_of(&item.id) {
                        Some(idx) => group.items[idx] = item,
                        None => group.items.push(item),
                    }
                }
                group
                    .parent_classes
                    .extend(new_group.parent_classes.into_iter());
                touched.push(group.name.clone());
            }
            None => {
                touched.push(new_group.name.clone());
                existing.push(new_group);
            }
        }
    }
    touched
}

/// Remove deleted items from every group they appear in.
///
/// Returns the names of groups that lost at least one item.
pub fn remove_items(existing: &mut [Group], deleted: &[Item]) -> Vec<String> {
    let deleted_ids: HashSet<&str> = deleted.iter().map(|i| i.id.as_str()).collect();
    let mut touched = Vec::new();
    for group in existing.iter_mut() {
        let before = group.items.len();
        group.items.retain(|item| !deleted_ids.contains(item.id.as_str()));
        if group.items.len() != before {
            touched.push(group.name.clone());
        }
    }
    touched
}
