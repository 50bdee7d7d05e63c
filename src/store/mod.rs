//! Versioned record store and the collectors and processors that sweep it.
//!
//! [`MemoryStore`] keeps versioned tables and publishing change sets in
//! memory and round-trips them through a JSON file. The collectors in this
//! module query it for stale data; the processors delete what they are given.

mod change_set;
mod versioned;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

pub use change_set::{ChangeSetCollector, ChangeSetProcessor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
pub use versioned::{VersionedCollector, VersionedProcessor};

use crate::{
    config::{CollectorConfig, SweeperConfig},
    sweep::{
        CollectError, CollectorRegistry, MessageSink, ProcessError, ProcessorRegistry, Sweeper,
    },
};

/// Errors from the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read or write store file {1}: {0}")]
    Io(std::io::Error, PathBuf),

    #[error("Invalid store file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Record {table}#{id} not found")]
    RecordNotFound { table: String, id: u64 },

    #[error("Change set {0} not found")]
    ChangeSetNotFound(u64),
}

impl From<StoreError> for ProcessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TableNotFound(table) => ProcessError::NotFound(format!("table {table}")),
            StoreError::RecordNotFound { table, id } => {
                ProcessError::NotFound(format!("{table}#{id}"))
            }
            StoreError::ChangeSetNotFound(id) => ProcessError::NotFound(format!("ChangeSet#{id}")),
            other => ProcessError::Storage(other.to_string()),
        }
    }
}

impl From<StoreError> for CollectError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TableNotFound(table) => CollectError::UnknownTable(table),
            other => CollectError::Storage(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One saved version of a versioned record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRow {
    pub version: u32,
    pub last_edited: DateTime<Utc>,
    #[serde(default)]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// A versioned record and its version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRow {
    pub id: u64,
    #[serde(default)]
    pub versions: Vec<VersionRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSetState {
    Open,
    Published,
    Reverted,
}

/// A publishing change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetRow {
    pub id: u64,
    pub state: ChangeSetState,
    pub last_edited: DateTime<Utc>,
    /// Number of change set items attached.
    #[serde(default)]
    pub items: u64,
}

/// Serialized form of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreData {
    /// Versioned tables keyed by table name.
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<VersionedRow>>,
    #[serde(default)]
    pub change_sets: Vec<ChangeSetRow>,
}

/// In-memory record store.
///
/// Suitable for local runs and tests. Changes are only persisted when
/// [`save`](Self::save) is called.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: StoreData) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Load a store from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Io(e, path.to_path_buf()))?;
        let data: StoreData = serde_json::from_str(&contents)?;

        tracing::debug!(
            path = %path.display(),
            tables = data.tables.len(),
            change_sets = data.change_sets.len(),
            "Loaded record store"
        );

        Ok(Self::from_data(data))
    }

    /// Write the store to a JSON file, replacing it.
    ///
    /// The data is written to a sibling `.tmp` file and renamed over the
    /// target, so an interrupted save leaves the previous file intact.
    pub async fn save(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let contents = {
            let data = self.data.read().await;
            serde_json::to_string_pretty(&*data)?
        };

        let temp = temp_path(path);
        tokio::fs::write(&temp, contents)
            .await
            .map_err(|e| StoreError::Io(e, temp.clone()))?;
        tokio::fs::rename(&temp, path)
            .await
            .map_err(|e| StoreError::Io(e, path.to_path_buf()))
    }

    pub async fn snapshot(&self) -> StoreData {
        self.data.read().await.clone()
    }

    /// Names of all versioned tables.
    pub async fn tables(&self) -> Vec<String> {
        self.data.read().await.tables.keys().cloned().collect()
    }

    pub async fn versioned_rows(&self, table: &str) -> StoreResult<Vec<VersionedRow>> {
        self.data
            .read()
            .await
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))
    }

    pub async fn insert_versioned(&self, table: impl Into<String>, row: VersionedRow) {
        let mut data = self.data.write().await;
        let rows = data.tables.entry(table.into()).or_default();
        match rows.iter().position(|r| r.id == row.id) {
            Some(index) => rows[index] = row,
            None => rows.push(row),
        }
    }

    /// Delete the given versions of a record, optionally restricted to one
    /// locale. Returns the number of versions removed.
    pub async fn delete_versions(
        &self,
        table: &str,
        id: u64,
        versions: &[u32],
        locale: Option<&str>,
    ) -> StoreResult<u64> {
        let mut data = self.data.write().await;
        let rows = data
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::RecordNotFound {
                table: table.to_string(),
                id,
            })?;

        let before = row.versions.len();
        row.versions.retain(|v| {
            let targeted = versions.contains(&v.version)
                && locale.is_none_or(|l| v.locale.as_deref() == Some(l));
            !targeted
        });

        Ok((before - row.versions.len()) as u64)
    }

    pub async fn change_sets(&self) -> Vec<ChangeSetRow> {
        self.data.read().await.change_sets.clone()
    }

    /// Delete a change set and its items. Returns the number of rows removed.
    pub async fn delete_change_set(&self, id: u64) -> StoreResult<u64> {
        let mut data = self.data.write().await;
        let index = data
            .change_sets
            .iter()
            .position(|c| c.id == id)
            .ok_or(StoreError::ChangeSetNotFound(id))?;
        let removed = data.change_sets.remove(index);
        Ok(removed.items + 1)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Register the built-in processors against a store.
pub fn processor_registry(store: &Arc<MemoryStore>) -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register("versioned", Arc::new(VersionedProcessor::new(store.clone())));
    registry.register("change_set", Arc::new(ChangeSetProcessor::new(store.clone())));
    registry
}

/// Build every collector defined in the configuration.
pub fn collector_registry(config: &SweeperConfig, store: &Arc<MemoryStore>) -> CollectorRegistry {
    let mut registry = CollectorRegistry::new();
    for (name, collector) in config.collectors.iter() {
        match collector {
            CollectorConfig::Versioned(c) => registry.register(
                name,
                Arc::new(VersionedCollector::new(name, store.clone(), c.clone())),
            ),
            CollectorConfig::ChangeSet(c) => registry.register(
                name,
                Arc::new(ChangeSetCollector::new(name, store.clone(), c.clone())),
            ),
        }
    }
    registry
}

/// Build a sweeper over a store from configuration.
pub fn build_sweeper(
    config: &SweeperConfig,
    store: &Arc<MemoryStore>,
    sink: Arc<dyn MessageSink>,
) -> Sweeper {
    Sweeper::new(
        collector_registry(config, store),
        processor_registry(store),
        config.sweep.collectors.clone(),
        sink,
    )
    .with_dry_run(config.sweep.dry_run)
}
