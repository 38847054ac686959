//! Record source: the lazy, finite, single-pass input of a step.
//!
//! A source is opened once when its step starts and closed once when the
//! step ends, whatever the outcome. It cannot be rewound: running the step
//! again needs a fresh source bound to a fresh resource handle.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{BatchError, MappingError};
use crate::types::RawRecord;

/// One pulled line: tokenized, or rejected by the source itself (bytes that
/// do not decode, say). Rejections are classified like any other bad line.
pub type SourceRecord = Result<RawRecord, MappingError>;

/// Produces raw records from an underlying resource.
///
/// Implementations include [`MemorySource`] and the CSV file source in
/// `custload-csv`.
pub trait RecordSource: Send {
    /// Acquire the underlying resource and skip the configured leading lines.
    fn open(&mut self) -> Result<(), BatchError>;

    /// Next record, or `None` once the input is exhausted.
    ///
    /// A line the source cannot tokenize is `Some(Err(_))` and goes to the
    /// skip policy. I/O failures are [`BatchError::Resource`] and end the step.
    fn read(&mut self) -> Result<Option<SourceRecord>, BatchError>;

    /// Release the underlying resource. Must be safe to call more than once.
    fn close(&mut self) -> Result<(), BatchError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        "source"
    }
}

// ─── In-memory source ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    New,
    Open,
    Closed,
}

/// Source over in-memory lines, already split into fields.
///
/// Honors `lines_to_skip` the same way a file source does.
pub struct MemorySource {
    names: Arc<[String]>,
    lines: VecDeque<Vec<String>>,
    lines_to_skip: usize,
    next_line: u64,
    state: SourceState,
}

impl MemorySource {
    pub fn new(names: Arc<[String]>, lines: Vec<Vec<String>>) -> Self {
        Self {
            names,
            lines: lines.into(),
            lines_to_skip: 0,
            next_line: 1,
            state: SourceState::New,
        }
    }

    /// Split each line on `delimiter`; no quoting rules apply.
    pub fn from_delimited(names: Arc<[String]>, text: &str, delimiter: char) -> Self {
        let lines = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.split(delimiter).map(str::to_string).collect())
            .collect();
        Self::new(names, lines)
    }

    pub fn lines_to_skip(mut self, n: usize) -> Self {
        self.lines_to_skip = n;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.state == SourceState::Closed
    }
}

impl RecordSource for MemorySource {
    fn open(&mut self) -> Result<(), BatchError> {
        if self.state != SourceState::New {
            return Err(BatchError::Resource(
                "memory source cannot be reopened".into(),
            ));
        }
        for _ in 0..self.lines_to_skip {
            if self.lines.pop_front().is_none() {
                break;
            }
            self.next_line += 1;
        }
        self.state = SourceState::Open;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<SourceRecord>, BatchError> {
        match self.state {
            SourceState::New => Err(BatchError::Resource("source read before open".into())),
            SourceState::Closed => Ok(None),
            SourceState::Open => Ok(self.lines.pop_front().map(|values| {
                let line = self.next_line;
                self.next_line += 1;
                Ok(RawRecord::new(line, self.names.clone(), values))
            })),
        }
    }

    fn close(&mut self) -> Result<(), BatchError> {
        self.lines.clear();
        self.state = SourceState::Closed;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
