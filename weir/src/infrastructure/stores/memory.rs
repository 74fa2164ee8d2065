// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! In-memory implementation of the result store. The default store for
//! tests and for hosts that do not need run results to survive restarts.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use weir_domain::error::PipelineError;
use weir_domain::repositories::ResultStore;

/// Keyed store backed by a mutex-guarded map.
///
/// Every operation takes the lock for its full duration, so the store is
/// observable as if serialized.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn add(&self, key: &str, value: Value, overwrite: bool) -> Result<(), PipelineError> {
        let mut data = self.data.lock().await;
        if !overwrite && data.contains_key(key) {
            return Err(PipelineError::KeyExists(key.to_string()));
        }
        data.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, PipelineError> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), PipelineError> {
        self.data.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, PipelineError> {
        Ok(self.data.lock().await.keys().cloned().collect())
    }
}
