//! Step configuration.

use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// Items per commit unit.
pub const DEFAULT_CHUNK_SIZE: usize = 10;
/// Maximum number of chunks in flight.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;

/// Configuration for one chunk-oriented step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step name, used in logs and in the execution result.
    #[serde(default = "default_name")]
    pub name: String,
    /// Number of raw items pulled per chunk (one transaction each).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Number of workers running chunks in parallel.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Maximum skippable failures per step run.
    ///
    /// Has no default: a step refuses to build until this is set.
    #[serde(default)]
    pub skip_limit: Option<u64>,
}

fn default_name() -> String {
    "csv-step".into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            skip_limit: None,
        }
    }
}

impl StepConfig {
    /// Check bounds and return the resolved skip limit.
    pub fn validate(&self) -> Result<u64, BatchError> {
        if self.chunk_size == 0 {
            return Err(BatchError::Config("chunk_size must be at least 1".into()));
        }
        if self.concurrency_limit == 0 {
            return Err(BatchError::Config(
                "concurrency_limit must be at least 1".into(),
            ));
        }
        self.skip_limit.ok_or_else(|| {
            BatchError::Config(format!(
                "skip_limit must be set explicitly for step '{}'",
                self.name
            ))
        })
    }
}
