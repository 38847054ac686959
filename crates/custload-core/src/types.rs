//! Shared types for the batch pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ─── RawRecord ────────────────────────────────────────────────────────────────

/// One tokenized input line: an ordered set of named string fields.
///
/// Lookups are non-strict: a name that has no value on this line (a missing
/// trailing field) reads as the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based physical line number in the underlying resource.
    pub line: u64,
    /// Field names, shared by every record of a source.
    pub names: Arc<[String]>,
    /// Field values in positional order. May be shorter or longer than `names`.
    pub values: Vec<String>,
}

impl RawRecord {
    pub fn new(line: u64, names: Arc<[String]>, values: Vec<String>) -> Self {
        Self {
            line,
            names,
            values,
        }
    }

    /// Value of the named field, or `""` if the line has no such column.
    pub fn field(&self, name: &str) -> &str {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Value at a position, or `""` past the end of the line.
    pub fn value_at(&self, idx: usize) -> &str {
        self.values.get(idx).map(String::as_str).unwrap_or("")
    }

    /// Number of tokens actually present on the line.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ─── Stage ────────────────────────────────────────────────────────────────────

/// Pipeline stage a failure was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Read,
    Process,
    Write,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Process => write!(f, "process"),
            Self::Write => write!(f, "write"),
        }
    }
}

// ─── Status ───────────────────────────────────────────────────────────────────

/// Terminal status of a step or a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

// ─── ChunkState ───────────────────────────────────────────────────────────────

/// Lifecycle of one chunk on a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Worker has not pulled anything yet.
    Idle,
    /// Pulling raw items and running them through mapper + filter.
    Filling,
    /// Writing survivors into an open sink transaction.
    Processing,
    /// Deciding between commit and rollback.
    Committing,
    Committed,
    RolledBack,
}

impl std::fmt::Display for ChunkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Filling => write!(f, "filling"),
            Self::Processing => write!(f, "processing"),
            Self::Committing => write!(f, "committing"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled-back"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Arc<[String]> {
        vec!["id".to_string(), "name".to_string(), "country".to_string()].into()
    }

    #[test]
    fn field_lookup_by_name() {
        let raw = RawRecord::new(2, names(), vec!["1".into(), "Ann".into(), "Peru".into()]);
        assert_eq!(raw.field("name"), "Ann");
        assert_eq!(raw.field("country"), "Peru");
        assert_eq!(raw.field("unknown"), "");
    }

    #[test]
    fn missing_trailing_fields_read_as_empty() {
        let raw = RawRecord::new(3, names(), vec!["1".into()]);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.field("country"), "");
        assert_eq!(raw.value_at(5), "");
    }

    #[test]
    fn status_display() {
        assert_eq!(BatchStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(Stage::Write.to_string(), "write");
        assert!(!BatchStatus::Failed.is_completed());
    }
}
