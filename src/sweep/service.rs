use std::sync::Arc;

use super::{
    dispatcher::Dispatcher,
    error::SweepResult,
    message::MessageSink,
    registry::{CollectorRegistry, ProcessorRegistry},
    traits::Collector,
};

/// Runs every configured collector through the dispatcher.
///
/// Built once at start-up and shared by reference. Collector-level errors
/// are returned immediately; the remaining collectors are not run.
pub struct Sweeper {
    collectors: CollectorRegistry,
    processors: ProcessorRegistry,
    /// Collector identifiers to run, in order.
    enabled: Vec<String>,
    sink: Arc<dyn MessageSink>,
    dry_run: bool,
}

impl Sweeper {
    pub fn new(
        collectors: CollectorRegistry,
        processors: ProcessorRegistry,
        enabled: Vec<String>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            collectors,
            processors,
            enabled,
            sink,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }

    /// Identifiers of the collectors `run_all` will run, in order.
    pub fn enabled(&self) -> &[String] {
        &self.enabled
    }

    /// Resolve the configured collectors, in order.
    pub fn collectors(&self) -> SweepResult<Vec<Arc<dyn Collector>>> {
        self.enabled
            .iter()
            .map(|id| self.collectors.resolve(id))
            .collect()
    }

    pub fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(&self.processors, self.sink.as_ref()).with_dry_run(self.dry_run)
    }

    /// Sweep every configured collector.
    pub async fn run_all(&self) -> SweepResult<()> {
        tracing::debug!(collectors = self.enabled.len(), "Starting sweep run");

        let dispatcher = self.dispatcher();
        for id in &self.enabled {
            let collector = self.collectors.resolve(id)?;
            dispatcher.dispatch_collector(collector.as_ref()).await?;
        }

        Ok(())
    }

    /// Sweep a single registered collector, whether or not it is enabled.
    pub async fn run_collector(&self, id: &str) -> SweepResult<()> {
        let collector = self.collectors.resolve(id)?;
        self.dispatcher().dispatch_collector(collector.as_ref()).await
    }
}
