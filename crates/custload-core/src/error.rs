//! Error types for the custload pipeline.
//!
//! Per-item errors ([`MappingError`], [`ProcessError`], [`WriteError`],
//! wrapped in [`ItemError`]) are offered to the skip policy. Step-level
//! errors ([`BatchError`]) end the step.

use std::num::ParseIntError;

use thiserror::Error;

use crate::types::Stage;

/// Boxed error used by user-provided stages that wrap foreign failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A raw line could not be converted into a domain record.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("line {line}: field '{field}' is not a valid number ({value:?}): {source}")]
    InvalidNumber {
        line: u64,
        field: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: {source}")]
    Other {
        line: u64,
        #[source]
        source: BoxError,
    },
}

impl MappingError {
    /// Physical line of the offending record.
    pub fn line(&self) -> u64 {
        match self {
            Self::InvalidNumber { line, .. }
            | Self::FieldCount { line, .. }
            | Self::Other { line, .. } => *line,
        }
    }
}

/// The filter/transform stage failed on an item (distinct from exclusion).
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("item rejected: {reason}")]
    Rejected { reason: String },

    #[error("{0}")]
    Other(#[source] BoxError),
}

/// The sink refused to persist an item.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("constraint violation for id {id}: {reason}")]
    Constraint { id: String, reason: String },

    #[error("write conflict for id {id}")]
    Conflict { id: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(#[source] BoxError),
}

/// A failure attached to a single item, tagged by the stage that raised it.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("read failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("process failed: {0}")]
    Process(#[from] ProcessError),

    #[error("write failed: {0}")]
    Write(#[from] WriteError),
}

impl ItemError {
    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Mapping(_) => Stage::Read,
            Self::Process(_) => Stage::Process,
            Self::Write(_) => Stage::Write,
        }
    }
}

/// Errors that end a step (and the job running it).
#[derive(Debug, Error)]
pub enum BatchError {
    /// Source or sink unavailable. Never offered to the skip policy.
    #[error("resource error: {0}")]
    Resource(String),

    #[error("skip limit {limit} exceeded in {stage} stage: {source}")]
    SkipLimitExceeded {
        limit: u64,
        stage: Stage,
        #[source]
        source: ItemError,
    },

    #[error("non-skippable failure in {stage} stage: {source}")]
    NonSkippable {
        stage: Stage,
        #[source]
        source: ItemError,
    },

    #[error("commit of chunk {chunk} failed: {reason}")]
    Commit { chunk: u64, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("worker task panicked: {0}")]
    WorkerPanicked(String),
}

impl BatchError {
    /// Returns `true` for the failures produced by skip classification
    /// (a non-skippable cause, or a skippable one past the limit).
    pub fn is_fatal_abort(&self) -> bool {
        matches!(self, Self::SkipLimitExceeded { .. } | Self::NonSkippable { .. })
    }

    /// Returns `true` if the source or sink was unavailable.
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource(_))
    }
}

impl From<std::io::Error> for BatchError {
    fn from(e: std::io::Error) -> Self {
        Self::Resource(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bad_id() -> MappingError {
        let source = "x".parse::<i64>().unwrap_err();
        MappingError::InvalidNumber {
            line: 4,
            field: "id".into(),
            value: "x".into(),
            source,
        }
    }

    #[test]
    fn item_error_reports_stage() {
        assert_eq!(ItemError::from(bad_id()).stage(), Stage::Read);
        assert_eq!(
            ItemError::from(ProcessError::Rejected { reason: "no".into() }).stage(),
            Stage::Process
        );
        assert_eq!(
            ItemError::from(WriteError::Storage("down".into())).stage(),
            Stage::Write
        );
    }

    #[test]
    fn mapping_error_message_names_line_and_field() {
        let msg = bad_id().to_string();
        assert!(msg.contains("line 4"));
        assert!(msg.contains("'id'"));
        assert_eq!(bad_id().line(), 4);
    }

    #[test]
    fn fatal_abort_classification() {
        let err = BatchError::NonSkippable {
            stage: Stage::Write,
            source: WriteError::Storage("boom".into()).into(),
        };
        assert!(err.is_fatal_abort());
        assert!(!BatchError::Resource("gone".into()).is_fatal_abort());
        assert!(BatchError::Resource("gone".into()).is_resource());
    }
}
