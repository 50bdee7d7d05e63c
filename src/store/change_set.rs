use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::{ChangeSetState, MemoryStore};
use crate::{
    config::ChangeSetCollectorConfig,
    sweep::{
        CollectError, Collection, Collector, ProcessError, Processor, ProcessorId, Record,
        RecordKind,
    },
};

/// Collects published and reverted change sets older than the lifetime.
///
/// Open change sets are never collected. All candidates form a single
/// collection, oldest first.
pub struct ChangeSetCollector {
    name: String,
    store: Arc<MemoryStore>,
    config: ChangeSetCollectorConfig,
}

impl ChangeSetCollector {
    pub fn new(
        name: impl Into<String>,
        store: Arc<MemoryStore>,
        config: ChangeSetCollectorConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            config,
        }
    }
}

#[async_trait]
impl Collector for ChangeSetCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn processors(&self) -> Vec<ProcessorId> {
        self.config.processors.clone()
    }

    async fn collections(&self) -> Result<Vec<Collection>, CollectError> {
        let cutoff = Utc::now() - self.config.lifetime();

        let mut candidates: Vec<_> = self
            .store
            .change_sets()
            .await
            .into_iter()
            .filter(|c| c.state != ChangeSetState::Open && c.last_edited < cutoff)
            .collect();
        candidates.sort_by_key(|c| (c.last_edited, c.id));

        if self.config.deletion_limit > 0 {
            candidates.truncate(self.config.deletion_limit);
        }

        tracing::debug!(
            collector = %self.name,
            change_sets = candidates.len(),
            "Collected completed change sets"
        );

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let collection: Collection = candidates
            .iter()
            .map(|c| Record::change_set(c.id).into())
            .collect();
        Ok(vec![collection])
    }
}

/// Deletes a change set together with its items.
pub struct ChangeSetProcessor {
    store: Arc<MemoryStore>,
}

impl ChangeSetProcessor {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Processor for ChangeSetProcessor {
    fn name(&self) -> &str {
        "ChangeSetProcessor"
    }

    fn implemented_kind(&self) -> RecordKind {
        RecordKind::ChangeSet
    }

    async fn process(&self, record: &Record) -> Result<u64, ProcessError> {
        Ok(self.store.delete_change_set(record.id).await?)
    }
}
