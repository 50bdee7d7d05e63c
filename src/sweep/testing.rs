//! In-memory collectors and processors for tests.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use super::{
    error::{CollectError, ProcessError},
    record::{Collection, Record, RecordKind},
    traits::{Collector, Processor, ProcessorId},
};

/// Collector returning a fixed set of collections.
pub struct StaticCollector {
    name: String,
    processors: Vec<ProcessorId>,
    collections: Vec<Collection>,
    fail: bool,
}

impl StaticCollector {
    pub fn new<I, S>(name: &str, processors: I, collections: Vec<Collection>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            processors: processors.into_iter().map(Into::into).collect(),
            collections,
            fail: false,
        }
    }

    /// Make `collections` fail with a storage error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl Collector for StaticCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn processors(&self) -> Vec<ProcessorId> {
        self.processors.clone()
    }

    async fn collections(&self) -> Result<Vec<Collection>, CollectError> {
        if self.fail {
            return Err(CollectError::Storage("connection refused".into()));
        }
        Ok(self.collections.clone())
    }
}

/// Processor recording the ids it was invoked with.
pub struct StubProcessor {
    name: String,
    kind: RecordKind,
    rows: u64,
    fail_ids: HashSet<u64>,
    calls: Mutex<Vec<u64>>,
}

impl StubProcessor {
    pub fn new(name: &str, kind: RecordKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            rows: 1,
            fail_ids: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows = rows;
        self
    }

    /// Fail when invoked with a record with this id.
    pub fn failing_on(mut self, id: u64) -> Self {
        self.fail_ids.insert(id);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Record ids this processor was invoked with, in order.
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Processor for StubProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn implemented_kind(&self) -> RecordKind {
        self.kind
    }

    async fn process(&self, record: &Record) -> Result<u64, ProcessError> {
        self.calls.lock().unwrap().push(record.id);
        if self.fail_ids.contains(&record.id) {
            return Err(ProcessError::Storage(format!(
                "deadlock detected while deleting {record}"
            )));
        }
        Ok(self.rows)
    }
}
