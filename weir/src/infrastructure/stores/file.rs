// /////////////////////////////////////////////////////////////////////////////
// Weir Incremental Pipeline Engine
// Copyright (c) 2025 Weir Contributors
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File-Backed Result Store
//!
//! One JSON file per key under a configurable directory. Filenames are
//! derived from keys by replacing `:` and `/` with `_` and appending
//! `.json`, so a run result for component `grouper` in run `r1` lands in
//! `r1_grouper.json` and the run log in `pipeline_run_history.json`.
//!
//! Distinct keys always map to distinct filenames. Decoding a filename
//! back into a key is lossy for keys that already contain `_`, so
//! `list_keys` is a discovery aid, not a bijection; the engine always
//! addresses entries by their original key.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use weir_domain::error::PipelineError;
use weir_domain::repositories::ResultStore;

/// Result store persisting each key as a JSON file.
#[derive(Debug)]
pub struct FileStore {
    directory: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Opens a store rooted at `directory`, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        debug!(directory = %directory.display(), "opened file store");
        Ok(Self {
            directory,
            lock: Mutex::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Convert a key to its file path within the store directory.
    fn file_path(&self, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| if c == ':' || c == '/' { '_' } else { c })
            .collect();
        self.directory.join(format!("{safe_key}.json"))
    }
}

#[async_trait]
impl ResultStore for FileStore {
    async fn add(&self, key: &str, value: Value, overwrite: bool) -> Result<(), PipelineError> {
        let path = self.file_path(key);
        let _guard = self.lock.lock().await;
        if !overwrite && tokio::fs::try_exists(&path).await? {
            return Err(PipelineError::KeyExists(key.to_string()));
        }
        let encoded = serde_json::to_vec_pretty(&value)?;
        tokio::fs::write(&path, encoded).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, PipelineError> {
        let path = self.file_path(key);
        let _guard = self.lock.lock().await;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), PipelineError> {
        let path = self.file_path(key);
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, PipelineError> {
        let _guard = self.lock.lock().await;
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".json") {
                keys.push(stem.replace('_', ":"));
            }
        }
        Ok(keys)
    }
}
