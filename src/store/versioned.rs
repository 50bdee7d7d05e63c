use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;

use super::{MemoryStore, VersionRow, VersionedRow};
use crate::{
    config::VersionedCollectorConfig,
    sweep::{
        CollectError, Collection, CollectionNode, Collector, ProcessError, Processor, ProcessorId,
        Record, RecordKind,
    },
};

/// Collects stale versions of versioned records.
///
/// For each record the latest version, the newest published version and the
/// `keep_limit` newest versions are always kept. Of the rest, versions last
/// edited before the lifetime cut-off are collected. Each table becomes one
/// collection; with `locales` configured, each locale is a nested group.
pub struct VersionedCollector {
    name: String,
    store: Arc<MemoryStore>,
    config: VersionedCollectorConfig,
}

impl VersionedCollector {
    pub fn new(
        name: impl Into<String>,
        store: Arc<MemoryStore>,
        config: VersionedCollectorConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            config,
        }
    }

    async fn tables(&self) -> Vec<String> {
        if self.config.tables.is_empty() {
            self.store.tables().await
        } else {
            self.config.tables.clone()
        }
    }

    /// Stale version numbers among `versions`, ascending.
    fn stale_versions<'a>(&self, versions: impl Iterator<Item = &'a VersionRow>) -> Vec<u32> {
        let mut versions: Vec<&VersionRow> = versions.collect();
        versions.sort_by(|a, b| b.version.cmp(&a.version));

        let mut keep: BTreeSet<u32> = versions
            .iter()
            .take(self.config.keep_limit.max(1))
            .map(|v| v.version)
            .collect();
        if let Some(published) = versions.iter().find(|v| v.published) {
            keep.insert(published.version);
        }

        let cutoff = Utc::now() - self.config.lifetime();
        let mut stale: Vec<u32> = versions
            .iter()
            .filter(|v| !keep.contains(&v.version) && v.last_edited < cutoff)
            .map(|v| v.version)
            .collect();
        stale.sort_unstable();
        stale.dedup();
        stale
    }

    /// Leaves for one record, split into chunks of at most `query_limit` versions.
    fn record_leaves(
        &self,
        table: &str,
        row: &VersionedRow,
        locale: Option<&str>,
    ) -> Vec<Record> {
        let versions = row
            .versions
            .iter()
            .filter(|v| locale.is_none_or(|l| v.locale.as_deref() == Some(l)));
        let stale = self.stale_versions(versions);

        stale
            .chunks(self.config.query_limit.max(1))
            .map(|chunk| {
                let record = Record::version(table, row.id, chunk.to_vec());
                match locale {
                    Some(l) => record.with_locale(l),
                    None => record,
                }
            })
            .collect()
    }
}

#[async_trait]
impl Collector for VersionedCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn processors(&self) -> Vec<ProcessorId> {
        self.config.processors.clone()
    }

    async fn collections(&self) -> Result<Vec<Collection>, CollectError> {
        let limit = match self.config.deletion_limit {
            0 => usize::MAX,
            n => n,
        };
        let mut emitted = 0usize;
        let mut collections = Vec::new();

        for table in self.tables().await {
            if emitted >= limit {
                break;
            }

            let rows = self.store.versioned_rows(&table).await?;
            let mut collection: Collection = Vec::new();

            if self.config.locales.is_empty() {
                for row in &rows {
                    for record in self.record_leaves(&table, row, None) {
                        if emitted >= limit {
                            break;
                        }
                        collection.push(record.into());
                        emitted += 1;
                    }
                }
            } else {
                for locale in &self.config.locales {
                    let mut group = Vec::new();
                    for row in &rows {
                        for record in self.record_leaves(&table, row, Some(locale.as_str())) {
                            if emitted >= limit {
                                break;
                            }
                            group.push(CollectionNode::from(record));
                            emitted += 1;
                        }
                    }
                    if !group.is_empty() {
                        collection.push(CollectionNode::Group(group));
                    }
                }
            }

            tracing::debug!(
                collector = %self.name,
                table = %table,
                nodes = collection.len(),
                "Collected stale versions"
            );

            if !collection.is_empty() {
                collections.push(collection);
            }
        }

        Ok(collections)
    }
}

/// Deletes the versions listed in a [`RecordKind::Version`] record.
pub struct VersionedProcessor {
    store: Arc<MemoryStore>,
}

impl VersionedProcessor {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Processor for VersionedProcessor {
    fn name(&self) -> &str {
        "VersionedProcessor"
    }

    fn implemented_kind(&self) -> RecordKind {
        RecordKind::Version
    }

    async fn process(&self, record: &Record) -> Result<u64, ProcessError> {
        if record.versions.is_empty() {
            return Err(ProcessError::InvalidState(format!(
                "{} lists no versions",
                record
            )));
        }

        let deleted = self
            .store
            .delete_versions(
                &record.table,
                record.id,
                &record.versions,
                record.locale.as_deref(),
            )
            .await?;

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        store::{StoreData, tests::version},
        sweep::{count_records, leaves},
    };

    fn page(id: u64, versions: Vec<VersionRow>) -> VersionedRow {
        VersionedRow { id, versions }
    }

    fn store(rows: Vec<VersionedRow>) -> Arc<MemoryStore> {
        let mut data = StoreData::default();
        data.tables.insert("Page".into(), rows);
        Arc::new(MemoryStore::from_data(data))
    }

    fn collector(store: Arc<MemoryStore>, config: VersionedCollectorConfig) -> VersionedCollector {
        VersionedCollector::new("versions", store, config)
    }

    fn config(keep_limit: usize) -> VersionedCollectorConfig {
        VersionedCollectorConfig {
            lifetime_days: 30,
            keep_limit,
            ..Default::default()
        }
    }

    async fn collected(collector: &VersionedCollector) -> Vec<Record> {
        let collections = collector.collections().await.unwrap();
        collections
            .iter()
            .flat_map(|c| leaves(c).cloned().collect::<Vec<_>>())
            .collect()
    }

    #[rstest]
    #[case::keep_one(1, vec![1, 2, 3, 4])]
    #[case::keep_two(2, vec![1, 2, 3])]
    #[case::keep_all(10, vec![])]
    #[tokio::test]
    async fn test_keep_limit(#[case] keep_limit: usize, #[case] expected: Vec<u32>) {
        let store = store(vec![page(
            1,
            (1..=5).map(|v| version(v, 100, false)).collect(),
        )]);
        let records = collected(&collector(store, config(keep_limit))).await;

        let versions: Vec<u32> = records.iter().flat_map(|r| r.versions.clone()).collect();
        assert_eq!(versions, expected);
    }

    #[tokio::test]
    async fn test_latest_published_and_recent_versions_kept() {
        let store = store(vec![page(
            1,
            vec![
                version(1, 300, true),
                version(2, 200, true),
                version(3, 100, false),
                version(4, 5, false),
                version(5, 1, false),
            ],
        )]);
        let records = collected(&collector(store, config(1))).await;

        // 5 is latest, 2 is the newest published, 4 is inside the lifetime.
        assert_eq!(records, vec![Record::version("Page", 1, vec![1, 3])]);
    }

    #[tokio::test]
    async fn test_query_limit_chunks_versions() {
        let store = store(vec![page(
            1,
            (1..=8).map(|v| version(v, 100, false)).collect(),
        )]);
        let config = VersionedCollectorConfig {
            query_limit: 3,
            ..config(1)
        };
        let records = collected(&collector(store, config)).await;

        assert_eq!(
            records,
            vec![
                Record::version("Page", 1, vec![1, 2, 3]),
                Record::version("Page", 1, vec![4, 5, 6]),
                Record::version("Page", 1, vec![7]),
            ]
        );
    }

    #[tokio::test]
    async fn test_deletion_limit_caps_records() {
        let store = store(
            (1..=5)
                .map(|id| page(id, (1..=3).map(|v| version(v, 100, false)).collect()))
                .collect(),
        );
        let config = VersionedCollectorConfig {
            deletion_limit: 2,
            ..config(1)
        };
        let collections = collector(store, config).collections().await.unwrap();

        assert_eq!(collections.len(), 1);
        assert_eq!(count_records(&collections[0]), 2);
    }

    #[tokio::test]
    async fn test_locales_nest_groups() {
        let localised = |v, locale: &str| VersionRow {
            locale: Some(locale.to_string()),
            ..version(v, 100, false)
        };
        let store = store(vec![page(
            1,
            vec![
                localised(1, "en_NZ"),
                localised(2, "en_NZ"),
                localised(1, "de_DE"),
            ],
        )]);
        let config = VersionedCollectorConfig {
            locales: vec!["en_NZ".into(), "de_DE".into()],
            ..config(1)
        };
        let collections = collector(store, config).collections().await.unwrap();

        // de_DE has a single (latest) version, so only en_NZ yields a group.
        assert_eq!(
            collections,
            vec![vec![CollectionNode::Group(vec![
                Record::version("Page", 1, vec![1]).with_locale("en_NZ").into()
            ])]]
        );
    }

    #[tokio::test]
    async fn test_unknown_table_fails_collector() {
        let store = store(vec![]);
        let config = VersionedCollectorConfig {
            tables: vec!["File".into()],
            ..config(1)
        };
        let err = collector(store, config).collections().await.unwrap_err();
        assert!(matches!(err, CollectError::UnknownTable(ref t) if t == "File"));
    }

    #[tokio::test]
    async fn test_processor_deletes_versions() {
        let store = store(vec![page(
            1,
            (1..=4).map(|v| version(v, 100, false)).collect(),
        )]);
        let processor = VersionedProcessor::new(store.clone());

        let count = processor
            .process(&Record::version("Page", 1, vec![1, 2]))
            .await
            .unwrap();

        assert_eq!(count, 2);
        let rows = store.versioned_rows("Page").await.unwrap();
        assert_eq!(rows[0].versions.len(), 2);
    }

    #[tokio::test]
    async fn test_processor_missing_record() {
        let processor = VersionedProcessor::new(store(vec![]));
        let err = processor
            .process(&Record::version("Page", 42, vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound(_)));
        assert_eq!(err.to_string(), "Record not found: Page#42");
    }
}
