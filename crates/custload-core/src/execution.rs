//! Step and job execution results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::BatchError;
use crate::types::{BatchStatus, Stage};

/// Terminal record of one step run. Built once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct StepExecutionResult {
    pub step_name: String,
    pub status: BatchStatus,
    /// Raw items pulled from the source.
    pub items_read: u64,
    /// Items excluded by the filter stage (not skips).
    pub items_filtered: u64,
    /// Items durably written by committed chunks.
    pub items_written: u64,
    /// Skips across all stages; never exceeds the skip limit.
    pub items_skipped: u64,
    pub read_skips: u64,
    pub process_skips: u64,
    pub write_skips: u64,
    pub chunks_committed: u64,
    pub chunks_rolled_back: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Display form of the terminating cause, if the step failed.
    pub exit_message: Option<String>,
    /// The terminating cause, if the step failed.
    #[serde(skip)]
    pub failure: Option<Arc<BatchError>>,
}

impl StepExecutionResult {
    /// A result for a step that failed before any chunk ran.
    pub fn failed_to_start(step_name: impl Into<String>, cause: BatchError) -> Self {
        let now = Utc::now();
        StepMetrics::default().finish(step_name.into(), now, Some(cause))
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// Skips recorded for one stage.
    pub fn skips_in(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Read => self.read_skips,
            Stage::Process => self.process_skips,
            Stage::Write => self.write_skips,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

/// Outcome of a job: its status plus the result of every step that ran.
#[derive(Debug, Clone, Serialize)]
pub struct JobExecution {
    pub job_name: String,
    pub status: BatchStatus,
    pub steps: Vec<StepExecutionResult>,
}

impl JobExecution {
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// Result of the last step that ran (the only one for single-step jobs).
    pub fn last_step(&self) -> Option<&StepExecutionResult> {
        self.steps.last()
    }

    pub fn step(&self, name: &str) -> Option<&StepExecutionResult> {
        self.steps.iter().find(|s| s.step_name == name)
    }
}

// ─── Live counters ────────────────────────────────────────────────────────────

/// Counters shared by the workers of one step run.
#[derive(Debug, Default)]
pub(crate) struct StepMetrics {
    pub(crate) read: AtomicU64,
    pub(crate) filtered: AtomicU64,
    pub(crate) written: AtomicU64,
    pub(crate) read_skips: AtomicU64,
    pub(crate) process_skips: AtomicU64,
    pub(crate) write_skips: AtomicU64,
    pub(crate) committed: AtomicU64,
    pub(crate) rolled_back: AtomicU64,
}

impl StepMetrics {
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self, stage: Stage) {
        let counter = match stage {
            Stage::Read => &self.read_skips,
            Stage::Process => &self.process_skips,
            Stage::Write => &self.write_skips,
        };
        Self::add(counter, 1);
    }

    pub(crate) fn finish(
        &self,
        step_name: String,
        started_at: DateTime<Utc>,
        failure: Option<BatchError>,
    ) -> StepExecutionResult {
        let load = |c: &AtomicU64| c.load(Ordering::Acquire);
        let (read_skips, process_skips, write_skips) = (
            load(&self.read_skips),
            load(&self.process_skips),
            load(&self.write_skips),
        );
        let status = if failure.is_some() {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        };
        StepExecutionResult {
            step_name,
            status,
            items_read: load(&self.read),
            items_filtered: load(&self.filtered),
            items_written: load(&self.written),
            items_skipped: read_skips + process_skips + write_skips,
            read_skips,
            process_skips,
            write_skips,
            chunks_committed: load(&self.committed),
            chunks_rolled_back: load(&self.rolled_back),
            started_at,
            ended_at: Utc::now(),
            exit_message: failure.as_ref().map(ToString::to_string),
            failure: failure.map(Arc::new),
        }
    }
}
