//! Collector → processor dispatch.
//!
//! For each collector the dispatcher builds a [`ProcessorMap`] from the
//! processors the collector declares, then walks every collection tree the
//! collector produces and routes each leaf record to the first processor
//! whose kind matches. Per-record failures are logged and never abort the
//! run; collector-level failures (unknown processors, failing collectors)
//! propagate to the caller.

use tracing::Instrument;

use super::{
    error::{SweepError, SweepResult},
    message::{Message, MessageSink},
    record::{CollectionNode, Record, count_records, leaves},
    registry::{ProcessorMap, ProcessorRegistry},
    traits::Collector,
};

/// Routes records from collectors to processors.
///
/// Constructed once per run with the processor registry and a message sink,
/// and passed by reference to whatever drives the run.
pub struct Dispatcher<'a> {
    processors: &'a ProcessorRegistry,
    sink: &'a dyn MessageSink,
    dry_run: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(processors: &'a ProcessorRegistry, sink: &'a dyn MessageSink) -> Self {
        Self {
            processors,
            sink,
            dry_run: false,
        }
    }

    /// Resolve processors but report what would happen instead of invoking them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The de-duplicated processor map for a collector.
    pub fn processor_map(&self, collector: &dyn Collector) -> SweepResult<ProcessorMap> {
        self.processors.processor_map(collector)
    }

    /// Sweep every collection produced by a collector.
    ///
    /// A collector without processors is skipped with a notice and its
    /// collections are never computed.
    pub async fn dispatch_collector(&self, collector: &dyn Collector) -> SweepResult<()> {
        let span = tracing::info_span!("sweep_collector", collector = collector.name());

        async {
            let map = self.processor_map(collector)?;

            if map.is_empty() {
                self.sink.emit(Message::notice(format!(
                    "No processors registered with collector {}",
                    collector.name()
                )));
                return Ok(());
            }

            let collections =
                collector
                    .collections()
                    .await
                    .map_err(|source| SweepError::Collect {
                        collector: collector.name().to_string(),
                        source,
                    })?;

            tracing::debug!(
                collections = collections.len(),
                records = collections.iter().map(|c| count_records(c)).sum::<usize>(),
                processors = map.len(),
                dry_run = self.dry_run,
                "Dispatching collections"
            );

            for collection in &collections {
                self.dispatch_collection(collection, &map).await;
            }

            Ok::<(), SweepError>(())
        }
        .instrument(span)
        .await
    }

    /// Sweep one collection (and any nested collections) with a processor map.
    pub async fn dispatch_collection(&self, collection: &[CollectionNode], map: &ProcessorMap) {
        if map.is_empty() {
            self.sink
                .emit(Message::notice("No processors provided for collection"));
            return;
        }

        self.route(collection, map).await;
    }

    /// Route every leaf of a tree, depth-first in sequence order.
    ///
    /// Nested groups share the same processor map, so the empty-map guard in
    /// [`Self::dispatch_collection`] only needs checking once per tree.
    pub(crate) async fn route(&self, nodes: &[CollectionNode], map: &ProcessorMap) {
        for record in leaves(nodes) {
            self.dispatch_record(record, map).await;
        }
    }

    async fn dispatch_record(&self, record: &Record, map: &ProcessorMap) {
        let Some((kind, id)) = map.find(record) else {
            self.sink.emit(Message::notice(format!(
                "Unable to find processor for {}",
                record.kind
            )));
            return;
        };

        let Some(processor) = self.processors.get(id) else {
            // Only reachable when a map outlives the registry it was built from
            self.sink.emit(Message::error(format!(
                "Unable to process records: \"Unknown processor '{id}'\""
            )));
            return;
        };

        if self.dry_run {
            self.sink.emit(Message::info(format!(
                "DRY RUN: Would process {kind} record {record} using {}",
                processor.name()
            )));
            return;
        }

        match processor.process(record).await {
            Ok(count) => {
                self.sink.emit(Message::info(format!(
                    "Processed {count} records for {kind} using {}",
                    processor.name()
                )));
            }
            Err(e) => {
                // Not retried within this pass
                tracing::debug!(record = %record, processor = processor.name(), error = %e, "Processor failed");
                self.sink
                    .emit(Message::error(format!("Unable to process records: \"{e}\"")));
            }
        }
    }
}
