//! Resumable batch job sweeping a single collector.
//!
//! A [`SweepJob`] moves through `Created → Running → Complete`:
//!
//! 1. `setup()` resolves the processor map, snapshots the collector's
//!    non-empty collections into `remaining` and estimates `total_steps`
//!    from the record count and batch size.
//! 2. Each `process()` call is one step driven by an external scheduler.
//!    A step routes the whole of `remaining`, so the first step always
//!    completes the job even when `total_steps` is larger than one.
//! 3. A step with no processors resolved fails the job without touching
//!    `remaining`.
//!
//! All state lives in [`SweepJobState`], which serializes so a scheduler can
//! checkpoint the job between steps and [`SweepJob::resume`] it later.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sweep::{
    Collection, Collector, Dispatcher, Message, MessageLog, ProcessorMap, ProcessorRegistry,
    SweepError, count_records,
};

/// Lifecycle of a sweep job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Created,
    Running,
    Complete,
    Failed,
}

/// Checkpointable state of a sweep job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepJobState {
    pub id: Uuid,
    /// Name of the collector this job sweeps.
    pub collector: String,
    pub batch_size: usize,
    /// Processor map resolved at setup.
    pub processors: ProcessorMap,
    /// Work not yet routed.
    pub remaining: Vec<Collection>,
    pub current_step: u64,
    pub total_steps: u64,
    pub status: JobStatus,
    #[serde(default)]
    pub dry_run: bool,
    /// Outcome messages from every step so far.
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

/// Errors that stop a job step.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job has not been set up")]
    NotSetUp,

    #[error("Job has already been set up")]
    AlreadySetUp,

    #[error("No Processors found for collector {collector}")]
    NoProcessors { collector: String },

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Job state belongs to collector {expected}, not {actual}")]
    CollectorMismatch { expected: String, actual: String },

    #[error(transparent)]
    Sweep(#[from] SweepError),
}

/// A sweep of one collector, executed in externally driven steps.
pub struct SweepJob {
    collector: Arc<dyn Collector>,
    processors: ProcessorRegistry,
    state: SweepJobState,
}

impl SweepJob {
    pub fn new(
        collector: Arc<dyn Collector>,
        processors: ProcessorRegistry,
        batch_size: usize,
    ) -> Result<Self, JobError> {
        if batch_size == 0 {
            return Err(JobError::InvalidBatchSize);
        }

        let state = SweepJobState {
            id: Uuid::new_v4(),
            collector: collector.name().to_string(),
            batch_size,
            processors: ProcessorMap::new(),
            remaining: Vec::new(),
            current_step: 0,
            total_steps: 0,
            status: JobStatus::Created,
            dry_run: false,
            messages: Vec::new(),
            created_at: Utc::now(),
        };

        Ok(Self {
            collector,
            processors,
            state,
        })
    }

    /// Rebuild a job from a checkpoint.
    pub fn resume(
        state: SweepJobState,
        collector: Arc<dyn Collector>,
        processors: ProcessorRegistry,
    ) -> Result<Self, JobError> {
        if state.collector != collector.name() {
            return Err(JobError::CollectorMismatch {
                expected: state.collector,
                actual: collector.name().to_string(),
            });
        }
        if state.batch_size == 0 {
            return Err(JobError::InvalidBatchSize);
        }

        Ok(Self {
            collector,
            processors,
            state,
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.state.dry_run = dry_run;
        self
    }

    /// Resolve processors and snapshot the work. Called exactly once.
    pub async fn setup(&mut self) -> Result<(), JobError> {
        if self.state.status != JobStatus::Created {
            return Err(JobError::AlreadySetUp);
        }

        let processors = self.processors.processor_map(self.collector.as_ref())?;
        let mut collections =
            self.collector
                .collections()
                .await
                .map_err(|source| SweepError::Collect {
                    collector: self.collector.name().to_string(),
                    source,
                })?;
        // Collections without leaf records would cost a step and route nothing.
        collections.retain(|c| count_records(c) > 0);

        let records: usize = collections.iter().map(|c| count_records(c)).sum();
        let total_steps = records.div_ceil(self.state.batch_size) as u64;

        tracing::info!(
            job_id = %self.state.id,
            collector = %self.state.collector,
            records = records,
            batch_size = self.state.batch_size,
            total_steps = total_steps,
            "Sweep job set up"
        );

        self.state.processors = processors;
        self.state.remaining = collections;
        self.state.total_steps = total_steps;
        self.state.status = JobStatus::Running;

        Ok(())
    }

    /// Run one step.
    pub async fn process(&mut self) -> Result<(), JobError> {
        match self.state.status {
            JobStatus::Created => return Err(JobError::NotSetUp),
            JobStatus::Complete => return Ok(()),
            JobStatus::Running | JobStatus::Failed => {}
        }

        if self.state.remaining.is_empty() {
            self.state.status = JobStatus::Complete;
            return Ok(());
        }

        if self.state.processors.is_empty() {
            self.state.status = JobStatus::Failed;
            tracing::error!(
                job_id = %self.state.id,
                collector = %self.state.collector,
                "Sweep job has no processors"
            );
            return Err(JobError::NoProcessors {
                collector: self.state.collector.clone(),
            });
        }

        let remaining = std::mem::take(&mut self.state.remaining);
        let log = MessageLog::new();
        let dispatcher =
            Dispatcher::new(&self.processors, &log).with_dry_run(self.state.dry_run);
        for collection in &remaining {
            dispatcher.route(collection, &self.state.processors).await;
        }

        let messages = log.take();
        for message in &messages {
            tracing::debug!(job_id = %self.state.id, level = %message.level, "{}", message.text);
        }
        self.state.messages.extend(messages);
        self.state.current_step += 1;

        tracing::info!(
            job_id = %self.state.id,
            collector = %self.state.collector,
            step = self.state.current_step,
            total_steps = self.state.total_steps,
            "Sweep job step complete"
        );

        if self.state.remaining.is_empty() {
            self.state.status = JobStatus::Complete;
        }

        Ok(())
    }

    pub fn title(&self) -> String {
        format!("Sweep processing for {} collector", self.collector.name())
    }

    pub fn id(&self) -> Uuid {
        self.state.id
    }

    pub fn status(&self) -> JobStatus {
        self.state.status
    }

    pub fn is_complete(&self) -> bool {
        self.state.status == JobStatus::Complete
    }

    pub fn current_step(&self) -> u64 {
        self.state.current_step
    }

    pub fn total_steps(&self) -> u64 {
        self.state.total_steps
    }

    /// Leaf records not yet routed.
    pub fn remaining_records(&self) -> usize {
        self.state.remaining.iter().map(|c| count_records(c)).sum()
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    pub fn state(&self) -> &SweepJobState {
        &self.state
    }

    pub fn into_state(self) -> SweepJobState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::sweep::{
        CollectionNode, MessageLevel, Record, RecordKind,
        testing::{StaticCollector, StubProcessor},
    };

    fn versions(ids: impl IntoIterator<Item = u64>) -> Collection {
        ids.into_iter()
            .map(|id| Record::version("Page", id, vec![1]).into())
            .collect()
    }

    fn registry(processor: &Arc<StubProcessor>) -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        registry.register("versions", processor.clone());
        registry
    }

    #[rstest]
    #[case::empty(0, 10, 0)]
    #[case::exact(4, 2, 2)]
    #[case::rounds_up(5, 2, 3)]
    #[case::single_batch(3, 100, 1)]
    #[tokio::test]
    async fn test_setup_total_steps(
        #[case] records: u64,
        #[case] batch_size: usize,
        #[case] expected: u64,
    ) {
        let processor = StubProcessor::new("Versions", RecordKind::Version).arc();
        let collector = StaticCollector::new("pages", ["versions"], vec![versions(1..=records)]);
        let mut job = SweepJob::new(Arc::new(collector), registry(&processor), batch_size).unwrap();

        job.setup().await.unwrap();

        assert_eq!(job.total_steps(), expected);
        assert_eq!(job.current_step(), 0);
        assert_eq!(job.status(), JobStatus::Running);
        assert_eq!(job.remaining_records(), records as usize);
    }

    #[tokio::test]
    async fn test_single_step_completes_job() {
        let processor = StubProcessor::new("Versions", RecordKind::Version).arc();
        let collector = StaticCollector::new(
            "pages",
            ["versions"],
            vec![
                versions([1, 2]),
                vec![CollectionNode::Group(versions([3, 4, 5]))],
            ],
        );
        let mut job = SweepJob::new(Arc::new(collector), registry(&processor), 2).unwrap();
        job.setup().await.unwrap();
        assert_eq!(job.total_steps(), 3);

        job.process().await.unwrap();

        assert!(job.is_complete());
        assert_eq!(job.current_step(), 1);
        assert_eq!(job.remaining_records(), 0);
        assert_eq!(processor.calls(), vec![1, 2, 3, 4, 5]);
        assert_eq!(job.messages().len(), 5);
        assert!(job.messages().iter().all(|m| m.level == MessageLevel::Info));
    }

    #[tokio::test]
    async fn test_no_processors_fails_without_mutating_remaining() {
        let collector =
            StaticCollector::new("pages", Vec::<&str>::new(), vec![versions([1, 2])]);
        let mut job =
            SweepJob::new(Arc::new(collector), ProcessorRegistry::new(), 10).unwrap();
        job.setup().await.unwrap();

        let err = job.process().await.unwrap_err();

        assert!(matches!(err, JobError::NoProcessors { ref collector } if collector == "pages"));
        assert_eq!(err.to_string(), "No Processors found for collector pages");
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.remaining_records(), 2);
        assert_eq!(job.current_step(), 0);
        assert!(!job.is_complete());
    }

    #[tokio::test]
    async fn test_empty_remaining_completes_without_step() {
        let processor = StubProcessor::new("Versions", RecordKind::Version).arc();
        let collector = StaticCollector::new("pages", ["versions"], vec![]);
        let mut job = SweepJob::new(Arc::new(collector), registry(&processor), 10).unwrap();
        job.setup().await.unwrap();

        job.process().await.unwrap();

        assert!(job.is_complete());
        assert_eq!(job.current_step(), 0);
        assert!(processor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_collections_without_records_are_dropped() {
        let processor = StubProcessor::new("Versions", RecordKind::Version).arc();
        let collector = StaticCollector::new(
            "pages",
            ["versions"],
            vec![vec![], vec![CollectionNode::Group(vec![])]],
        );
        let mut job = SweepJob::new(Arc::new(collector), registry(&processor), 10).unwrap();
        job.setup().await.unwrap();

        assert_eq!(job.total_steps(), 0);
        assert!(job.state().remaining.is_empty());

        job.process().await.unwrap();

        assert!(job.is_complete());
        assert_eq!(job.current_step(), 0);
        assert!(job.messages().is_empty());
    }

    #[tokio::test]
    async fn test_resumed_job_takes_current_dry_run() {
        let processor = StubProcessor::new("Versions", RecordKind::Version).arc();
        let collector: Arc<dyn Collector> =
            Arc::new(StaticCollector::new("pages", ["versions"], vec![versions([1, 2])]));
        let mut job = SweepJob::new(collector.clone(), registry(&processor), 10)
            .unwrap()
            .with_dry_run(true);
        job.setup().await.unwrap();

        let mut resumed = SweepJob::resume(job.into_state(), collector, registry(&processor))
            .unwrap()
            .with_dry_run(false);
        resumed.process().await.unwrap();

        assert!(!resumed.state().dry_run);
        assert_eq!(processor.calls(), vec![1, 2]);
        assert!(resumed.messages().iter().all(|m| !m.text.starts_with("DRY RUN")));
    }

    #[tokio::test]
    async fn test_process_after_complete_is_noop() {
        let processor = StubProcessor::new("Versions", RecordKind::Version).arc();
        let collector = StaticCollector::new("pages", ["versions"], vec![versions([1])]);
        let mut job = SweepJob::new(Arc::new(collector), registry(&processor), 10).unwrap();
        job.setup().await.unwrap();
        job.process().await.unwrap();

        job.process().await.unwrap();

        assert_eq!(job.current_step(), 1);
        assert_eq!(processor.calls(), vec![1]);
    }

    #[tokio::test]
    async fn test_step_continues_after_record_failure() {
        let processor = StubProcessor::new("Versions", RecordKind::Version)
            .failing_on(1)
            .arc();
        let collector = StaticCollector::new("pages", ["versions"], vec![versions([1, 2])]);
        let mut job = SweepJob::new(Arc::new(collector), registry(&processor), 10).unwrap();
        job.setup().await.unwrap();

        job.process().await.unwrap();

        assert!(job.is_complete());
        assert_eq!(processor.calls(), vec![1, 2]);
        let levels: Vec<_> = job.messages().iter().map(|m| m.level).collect();
        assert_eq!(levels, vec![MessageLevel::Error, MessageLevel::Info]);
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let processor = StubProcessor::new("Versions", RecordKind::Version).arc();
        let collector: Arc<dyn Collector> =
            Arc::new(StaticCollector::new("pages", ["versions"], vec![]));

        assert!(matches!(
            SweepJob::new(collector.clone(), registry(&processor), 0),
            Err(JobError::InvalidBatchSize)
        ));

        let mut job = SweepJob::new(collector, registry(&processor), 10).unwrap();
        assert!(matches!(job.process().await, Err(JobError::NotSetUp)));
        job.setup().await.unwrap();
        assert!(matches!(job.setup().await, Err(JobError::AlreadySetUp)));
    }

    #[tokio::test]
    async fn test_checkpoint_and_resume() {
        let processor = StubProcessor::new("Versions", RecordKind::Version).arc();
        let collector: Arc<dyn Collector> =
            Arc::new(StaticCollector::new("pages", ["versions"], vec![versions([1, 2, 3])]));
        let mut job = SweepJob::new(collector.clone(), registry(&processor), 2).unwrap();
        job.setup().await.unwrap();

        let checkpoint = serde_json::to_string(job.state()).unwrap();
        let state: SweepJobState = serde_json::from_str(&checkpoint).unwrap();
        assert_eq!(state.total_steps, 2);
        assert_eq!(state.status, JobStatus::Running);

        let mut resumed = SweepJob::resume(state, collector, registry(&processor)).unwrap();
        assert_eq!(resumed.id(), job.id());
        resumed.process().await.unwrap();

        assert!(resumed.is_complete());
        assert_eq!(processor.calls(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_resume_rejects_other_collector() {
        let processor = StubProcessor::new("Versions", RecordKind::Version).arc();
        let job = SweepJob::new(
            Arc::new(StaticCollector::new("pages", ["versions"], vec![])),
            registry(&processor),
            10,
        )
        .unwrap();

        let result = SweepJob::resume(
            job.into_state(),
            Arc::new(StaticCollector::new("files", ["versions"], vec![])),
            registry(&processor),
        );

        assert!(matches!(result, Err(JobError::CollectorMismatch { .. })));
    }

    #[test]
    fn test_title() {
        let job = SweepJob::new(
            Arc::new(StaticCollector::new("pages", Vec::<&str>::new(), vec![])),
            ProcessorRegistry::new(),
            1,
        )
        .unwrap();
        assert_eq!(job.title(), "Sweep processing for pages collector");
    }
}
