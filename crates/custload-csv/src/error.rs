//! Error types for the CSV source.

use std::path::PathBuf;

use custload_core::BatchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvSourceError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: read failed after line {line}: {source}")]
    Read {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("invalid {what} {value:?}: must be a single ASCII character")]
    NonAsciiByte { what: &'static str, value: char },

    #[error("source {0}")]
    State(&'static str),
}

impl From<CsvSourceError> for BatchError {
    fn from(e: CsvSourceError) -> Self {
        match e {
            CsvSourceError::NonAsciiByte { .. } => BatchError::Config(e.to_string()),
            other => BatchError::Resource(other.to_string()),
        }
    }
}
