//! Registries resolving collector and processor identifiers to instances.
//!
//! Both registries are populated once at start-up and then shared by
//! reference; nothing mutates them during a run.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};

use super::{
    error::{SweepError, SweepResult},
    record::{Record, RecordKind},
    traits::{Collector, Processor, ProcessorId},
};

/// Processors available to collectors, keyed by identifier.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<ProcessorId, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor under an identifier, replacing any previous one.
    pub fn register(&mut self, id: impl Into<ProcessorId>, processor: Arc<dyn Processor>) {
        self.processors.insert(id.into(), processor);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.processors.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Build the processor map for a collector.
    ///
    /// Declared processors are de-duplicated on the kind they implement; when
    /// two declare the same kind the later one wins. An identifier that is not
    /// registered is a configuration error.
    pub fn processor_map(&self, collector: &dyn Collector) -> SweepResult<ProcessorMap> {
        let mut map = ProcessorMap::new();

        for id in collector.processors() {
            let processor = self
                .get(&id)
                .ok_or_else(|| SweepError::UnknownProcessor {
                    collector: collector.name().to_string(),
                    processor: id.clone(),
                })?;
            map.insert(processor.implemented_kind(), id);
        }

        Ok(map)
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processors", &self.ids())
            .finish()
    }
}

/// Collectors available to the sweeper, keyed by identifier.
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    collectors: HashMap<String, Arc<dyn Collector>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, collector: Arc<dyn Collector>) {
        self.collectors.insert(id.into(), collector);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Collector>> {
        self.collectors.get(id).cloned()
    }

    /// Resolve an identifier, failing if it was never registered.
    pub fn resolve(&self, id: &str) -> SweepResult<Arc<dyn Collector>> {
        self.get(id)
            .ok_or_else(|| SweepError::UnknownCollector(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.collectors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("collectors", &self.ids())
            .finish()
    }
}

/// Ordered mapping from record kind to processor identifier.
///
/// Iteration follows first-insertion order of each kind. Re-inserting a kind
/// replaces its processor but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessorMap {
    entries: Vec<(RecordKind, ProcessorId)>,
}

impl ProcessorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: RecordKind, processor: ProcessorId) {
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = processor,
            None => self.entries.push((kind, processor)),
        }
    }

    pub fn get(&self, kind: RecordKind) -> Option<&ProcessorId> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| id)
    }

    /// First entry, in map order, whose kind matches the record.
    pub fn find(&self, record: &Record) -> Option<(RecordKind, &ProcessorId)> {
        self.entries
            .iter()
            .find(|(kind, _)| kind.matches(record))
            .map(|(kind, id)| (*kind, id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordKind, &ProcessorId)> {
        self.entries.iter().map(|(kind, id)| (*kind, id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(RecordKind, ProcessorId)> for ProcessorMap {
    fn from_iter<T: IntoIterator<Item = (RecordKind, ProcessorId)>>(iter: T) -> Self {
        let mut map = ProcessorMap::new();
        for (kind, id) in iter {
            map.insert(kind, id);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::testing::{StaticCollector, StubProcessor};

    #[test]
    fn test_processor_map_last_registered_wins() {
        let mut registry = ProcessorRegistry::new();
        registry.register("first", StubProcessor::new("first", RecordKind::Version).arc());
        registry.register("cs", StubProcessor::new("cs", RecordKind::ChangeSet).arc());
        registry.register("second", StubProcessor::new("second", RecordKind::Version).arc());

        let collector = StaticCollector::new("pages", ["first", "cs", "second"], vec![]);
        let map = registry.processor_map(&collector).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(RecordKind::Version).unwrap(), "second");
        assert_eq!(map.get(RecordKind::ChangeSet).unwrap(), "cs");
        // Position of the first insertion is kept
        let kinds: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![RecordKind::Version, RecordKind::ChangeSet]);
    }

    #[test]
    fn test_processor_map_unknown_processor() {
        let registry = ProcessorRegistry::new();
        let collector = StaticCollector::new("pages", ["missing"], vec![]);

        let err = registry.processor_map(&collector).unwrap_err();
        assert!(matches!(
            err,
            SweepError::UnknownProcessor { ref processor, .. } if processor == "missing"
        ));
    }

    #[test]
    fn test_processor_map_empty_when_none_declared() {
        let registry = ProcessorRegistry::new();
        let collector = StaticCollector::new("pages", Vec::<&str>::new(), vec![]);
        assert!(registry.processor_map(&collector).unwrap().is_empty());
    }

    #[test]
    fn test_processor_map_find() {
        let map: ProcessorMap = [(RecordKind::ChangeSet, "cs".to_string())]
            .into_iter()
            .collect();
        assert_eq!(
            map.find(&Record::change_set(1)),
            Some((RecordKind::ChangeSet, &"cs".to_string()))
        );
        assert_eq!(map.find(&Record::version("Page", 1, vec![1])), None);
    }

    #[test]
    fn test_collector_registry_resolve() {
        let mut registry = CollectorRegistry::new();
        registry.register(
            "pages",
            Arc::new(StaticCollector::new("pages", Vec::<&str>::new(), vec![])),
        );

        assert_eq!(registry.resolve("pages").unwrap().name(), "pages");
        assert!(matches!(
            registry.resolve("nope"),
            Err(SweepError::UnknownCollector(ref id)) if id == "nope"
        ));
    }

    #[test]
    fn test_processor_map_serde_roundtrip() {
        let map: ProcessorMap = [
            (RecordKind::Version, "versioned".to_string()),
            (RecordKind::ChangeSet, "change_set".to_string()),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"[["version","versioned"],["change_set","change_set"]]"#);
        let parsed: ProcessorMap = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, map);
    }
}
