//! The chunk executor. Runs one chunk-oriented step.
//!
//! # Chunk lifecycle
//! ```text
//! Idle → Filling → Processing → Committing → Committed | RolledBack
//!          ▲                                      │
//!          └──────────── next chunk ──────────────┘
//! ```
//!
//! `concurrency_limit` worker tasks share one source. A worker takes the
//! source lock, pulls up to `chunk_size` raw records and the next chunk
//! sequence number, releases the lock, then maps, filters and writes the
//! chunk on its own inside one sink transaction.
//!
//! Every per-item failure goes through the skip policy and the shared
//! [`SkipCounter`]. A failure that cannot be skipped rolls the chunk back,
//! raises the abort flag (no new chunk is pulled, pending chunks roll back
//! instead of committing) and fails the step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use crate::config::StepConfig;
use crate::error::{BatchError, ItemError};
use crate::execution::{StepExecutionResult, StepMetrics};
use crate::job::Step;
use crate::listener::SkipListeners;
use crate::mapper::LineMapper;
use crate::processor::ItemProcessor;
use crate::sink::{Sink, SinkTransaction};
use crate::skip::{SkipCounter, SkipPolicy};
use crate::source::{RecordSource, SourceRecord};
use crate::types::ChunkState;

/// Raw records pulled for one commit unit.
#[derive(Debug)]
pub struct Chunk {
    /// Position of this chunk in pull order, starting at 0.
    pub sequence: u64,
    pub records: Vec<SourceRecord>,
}

/// A fully wired chunk-oriented step. Built with [`crate::StepBuilder`].
pub struct ChunkStep<T> {
    pub(crate) config: StepConfig,
    pub(crate) skip_limit: u64,
    pub(crate) source: Box<dyn RecordSource>,
    pub(crate) mapper: Arc<dyn LineMapper<T>>,
    pub(crate) processor: Arc<dyn ItemProcessor<T>>,
    pub(crate) sink: Arc<dyn Sink<T>>,
    pub(crate) policy: Arc<dyn SkipPolicy>,
    pub(crate) listeners: SkipListeners<T>,
}

impl<T> ChunkStep<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Run the step to completion or to its first fatal failure.
    ///
    /// The source is opened here and closed before returning on every path.
    pub async fn run(self) -> StepExecutionResult {
        let started_at = Utc::now();
        let Self {
            config,
            skip_limit,
            mut source,
            mapper,
            processor,
            sink,
            policy,
            listeners,
        } = self;

        info!(
            step = %config.name,
            source = source.name(),
            sink = sink.name(),
            chunk_size = config.chunk_size,
            concurrency = config.concurrency_limit,
            skip_limit,
            "Starting step"
        );

        if let Err(e) = source.open() {
            warn!(step = %config.name, error = %e, "Source failed to open");
            if let Err(close_err) = source.close() {
                warn!(step = %config.name, error = %close_err, "Source failed to close");
            }
            return StepExecutionResult::failed_to_start(config.name, e);
        }

        let shared = Arc::new(Shared {
            source: Mutex::new(SourceSlot {
                source,
                next_sequence: 0,
                exhausted: false,
            }),
            mapper,
            processor,
            sink,
            policy,
            listeners,
            skips: SkipCounter::new(skip_limit),
            chunk_size: config.chunk_size,
            step_name: config.name.clone(),
            abort: AtomicBool::new(false),
            failure: StdMutex::new(None),
            metrics: StepMetrics::default(),
        });

        let mut workers = JoinSet::new();
        for worker in 0..config.concurrency_limit {
            let shared = shared.clone();
            workers.spawn(async move {
                if let Err(e) = shared.run_worker(worker).await {
                    shared.fail(e);
                }
            });
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                shared.fail(BatchError::WorkerPanicked(e.to_string()));
            }
        }

        if let Err(e) = shared.source.lock().await.source.close() {
            shared.fail(e);
        }

        let failure = shared.failure.lock().unwrap().take();
        let result = shared.metrics.finish(config.name, started_at, failure);
        info!(
            step = %result.step_name,
            status = %result.status,
            read = result.items_read,
            filtered = result.items_filtered,
            written = result.items_written,
            skipped = result.items_skipped,
            chunks = result.chunks_committed,
            rolled_back = result.chunks_rolled_back,
            "Step finished"
        );
        result
    }
}

#[async_trait]
impl<T> Step for ChunkStep<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn execute(self: Box<Self>) -> StepExecutionResult {
        (*self).run().await
    }
}

// ─── Worker side ──────────────────────────────────────────────────────────────

struct SourceSlot {
    source: Box<dyn RecordSource>,
    next_sequence: u64,
    exhausted: bool,
}

struct Shared<T> {
    source: Mutex<SourceSlot>,
    mapper: Arc<dyn LineMapper<T>>,
    processor: Arc<dyn ItemProcessor<T>>,
    sink: Arc<dyn Sink<T>>,
    policy: Arc<dyn SkipPolicy>,
    listeners: SkipListeners<T>,
    skips: SkipCounter,
    chunk_size: usize,
    step_name: String,
    abort: AtomicBool,
    failure: StdMutex<Option<BatchError>>,
    metrics: StepMetrics,
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    /// Record the first fatal failure and stop further dispatch.
    fn fail(&self, error: BatchError) {
        self.abort.store(true, Ordering::Release);
        let mut slot = self.failure.lock().unwrap();
        if slot.is_none() {
            warn!(step = %self.step_name, error = %error, "Step failed");
            *slot = Some(error);
        } else {
            debug!(step = %self.step_name, error = %error, "Additional failure after abort");
        }
    }

    async fn run_worker(&self, worker: usize) -> Result<(), BatchError> {
        trace!(step = %self.step_name, worker, state = %ChunkState::Idle, "Worker started");
        while let Some(chunk) = self.pull_chunk().await? {
            self.run_chunk(worker, chunk).await?;
        }
        trace!(step = %self.step_name, worker, "Worker finished");
        Ok(())
    }

    /// Pull the next chunk under the source lock.
    ///
    /// Returns `None` once the source is exhausted or the step is aborting.
    async fn pull_chunk(&self) -> Result<Option<Chunk>, BatchError> {
        let mut slot = self.source.lock().await;
        if slot.exhausted || self.aborted() {
            return Ok(None);
        }

        let mut records = Vec::with_capacity(self.chunk_size);
        while records.len() < self.chunk_size {
            match slot.source.read()? {
                Some(raw) => records.push(raw),
                None => {
                    slot.exhausted = true;
                    break;
                }
            }
        }
        if records.is_empty() {
            return Ok(None);
        }

        let sequence = slot.next_sequence;
        slot.next_sequence += 1;
        StepMetrics::add(&self.metrics.read, records.len() as u64);
        Ok(Some(Chunk { sequence, records }))
    }

    async fn run_chunk(&self, worker: usize, chunk: Chunk) -> Result<(), BatchError> {
        let sequence = chunk.sequence;
        self.transition(worker, sequence, ChunkState::Filling);

        let survivors = match self.fill(chunk) {
            Ok(items) => items,
            Err(e) => {
                self.rolled_back(worker, sequence);
                return Err(e);
            }
        };

        if survivors.is_empty() {
            StepMetrics::add(&self.metrics.committed, 1);
            self.transition(worker, sequence, ChunkState::Committed);
            return Ok(());
        }

        self.transition(worker, sequence, ChunkState::Processing);
        let mut tx = match self.sink.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                self.rolled_back(worker, sequence);
                return Err(e);
            }
        };

        let mut written = 0u64;
        for item in &survivors {
            match tx.write(item).await {
                Ok(()) => written += 1,
                Err(e) => {
                    if let Err(fatal) = self.classify(e.into(), Some(item)) {
                        self.rollback(tx, worker, sequence).await;
                        return Err(fatal);
                    }
                }
            }
        }

        self.transition(worker, sequence, ChunkState::Committing);
        if self.aborted() {
            debug!(step = %self.step_name, chunk = sequence, "Step aborting; not committing chunk");
            self.rollback(tx, worker, sequence).await;
            return Ok(());
        }

        if let Err(e) = tx.commit().await {
            self.rolled_back(worker, sequence);
            return Err(BatchError::Commit {
                chunk: sequence,
                reason: e.to_string(),
            });
        }

        StepMetrics::add(&self.metrics.written, written);
        StepMetrics::add(&self.metrics.committed, 1);
        debug!(
            step = %self.step_name,
            worker,
            chunk = sequence,
            items = written,
            skips = self.skips.count(),
            "Chunk committed"
        );
        self.transition(worker, sequence, ChunkState::Committed);
        Ok(())
    }

    /// Map and filter every raw record of the chunk, in pull order.
    fn fill(&self, chunk: Chunk) -> Result<Vec<T>, BatchError> {
        let mut survivors = Vec::with_capacity(chunk.records.len());
        for pulled in chunk.records {
            let raw = match pulled {
                Ok(raw) => raw,
                Err(e) => {
                    self.classify(e.into(), None)?;
                    continue;
                }
            };
            let item = match self.mapper.map(&raw) {
                Ok(item) => item,
                Err(e) => {
                    self.classify(e.into(), None)?;
                    continue;
                }
            };

            let snapshot = item.clone();
            match self.processor.process(item) {
                Ok(Some(kept)) => survivors.push(kept),
                Ok(None) => StepMetrics::add(&self.metrics.filtered, 1),
                Err(e) => self.classify(e.into(), Some(&snapshot))?,
            }
        }
        Ok(survivors)
    }

    /// Skip the failed item, or turn the failure into a fatal step error.
    ///
    /// The verdict and the counter check-and-increment are evaluated before
    /// any listener is told, so listeners see the final decision.
    fn classify(&self, error: ItemError, item: Option<&T>) -> Result<(), BatchError> {
        let stage = error.stage();

        if !self.policy.should_skip(&error, self.skips.count()) {
            self.listeners.fatal(stage, item, &error);
            return Err(BatchError::NonSkippable {
                stage,
                source: error,
            });
        }

        match self.skips.try_acquire() {
            Some(count) => {
                self.metrics.record_skip(stage);
                debug!(step = %self.step_name, %stage, skips = count, %error, "Item skipped");
                self.listeners.skipped(stage, item, &error);
                Ok(())
            }
            None => {
                self.listeners.fatal(stage, item, &error);
                Err(BatchError::SkipLimitExceeded {
                    limit: self.skips.limit(),
                    stage,
                    source: error,
                })
            }
        }
    }

    async fn rollback(&self, tx: Box<dyn SinkTransaction<T>>, worker: usize, sequence: u64) {
        if let Err(e) = tx.rollback().await {
            warn!(step = %self.step_name, chunk = sequence, error = %e, "Rollback failed");
        }
        self.rolled_back(worker, sequence);
    }

    fn rolled_back(&self, worker: usize, sequence: u64) {
        StepMetrics::add(&self.metrics.rolled_back, 1);
        debug!(
            step = %self.step_name,
            worker,
            chunk = sequence,
            skips = self.skips.count(),
            "Chunk rolled back"
        );
        self.transition(worker, sequence, ChunkState::RolledBack);
    }

    fn transition(&self, worker: usize, sequence: u64, state: ChunkState) {
        trace!(step = %self.step_name, worker, chunk = sequence, %state, "Chunk state");
    }
}
