//! File-backed record source.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ByteRecord, Reader, ReaderBuilder, Trim};
use custload_core::{BatchError, MappingError, RawRecord, RecordSource, SourceRecord};
use tracing::{debug, info, warn};

use crate::error::CsvSourceError;

/// Builder for [`CsvRecordSource`].
#[derive(Debug, Clone)]
pub struct CsvSourceBuilder {
    path: PathBuf,
    delimiter: char,
    quote: char,
    comment: Option<char>,
    lines_to_skip: usize,
    names: Arc<[String]>,
    trim: bool,
}

impl CsvSourceBuilder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: ',',
            quote: '"',
            comment: Some('#'),
            lines_to_skip: 1,
            names: Arc::from(Vec::<String>::new()),
            trim: false,
        }
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    /// Lines starting with this character are ignored. `None` disables comments.
    pub fn comment(mut self, comment: Option<char>) -> Self {
        self.comment = comment;
        self
    }

    /// Leading physical lines dropped without validation (the header, by
    /// default). Comment and blank lines count; nothing is tokenized.
    pub fn lines_to_skip(mut self, n: usize) -> Self {
        self.lines_to_skip = n;
        self
    }

    /// Positional field names attached to every record.
    pub fn names(mut self, names: Arc<[String]>) -> Self {
        self.names = names;
        self
    }

    /// Trim surrounding whitespace from every field.
    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn build(self) -> Result<CsvRecordSource, CsvSourceError> {
        let delimiter = ascii_byte("delimiter", self.delimiter)?;
        let quote = ascii_byte("quote", self.quote)?;
        let comment = self.comment.map(|c| ascii_byte("comment", c)).transpose()?;

        let mut reader = ReaderBuilder::new();
        reader
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .quote(quote)
            .comment(comment)
            .trim(if self.trim { Trim::Fields } else { Trim::None });

        Ok(CsvRecordSource {
            path: self.path,
            builder: reader,
            names: self.names,
            lines_to_skip: self.lines_to_skip,
            reader: None,
            record: ByteRecord::new(),
            line_offset: 0,
            last_line: 0,
            state: State::New,
        })
    }
}

fn ascii_byte(what: &'static str, value: char) -> Result<u8, CsvSourceError> {
    if value.is_ascii() {
        Ok(value as u8)
    } else {
        Err(CsvSourceError::NonAsciiByte { what, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Open,
    Exhausted,
    Closed,
}

/// Reads one [`RawRecord`] per CSV record, lazily, in file order.
///
/// Not restartable: once closed or exhausted, a new source must be built.
pub struct CsvRecordSource {
    path: PathBuf,
    builder: ReaderBuilder,
    names: Arc<[String]>,
    lines_to_skip: usize,
    reader: Option<Reader<BufReader<File>>>,
    record: ByteRecord,
    /// Physical lines consumed before the csv reader took over.
    line_offset: u64,
    last_line: u64,
    state: State,
}

impl CsvRecordSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Physical line of the last record returned (0 before the first).
    pub fn last_line(&self) -> u64 {
        self.last_line
    }

    fn next_record(&mut self) -> Result<Option<SourceRecord>, CsvSourceError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(CsvSourceError::State("is not open"));
        };
        let more = reader
            .read_byte_record(&mut self.record)
            .map_err(|source| CsvSourceError::Read {
                path: self.path.clone(),
                line: self.last_line,
                source,
            })?;
        if !more {
            return Ok(None);
        }

        let line = self
            .record
            .position()
            .map(|p| p.line() + self.line_offset)
            .unwrap_or(self.last_line + 1);
        self.last_line = line;

        let mut values = Vec::with_capacity(self.record.len());
        for field in self.record.iter() {
            match std::str::from_utf8(field) {
                Ok(value) => values.push(value.to_string()),
                Err(e) => {
                    warn!(path = %self.path.display(), line, error = %e, "Undecodable CSV record");
                    return Ok(Some(Err(MappingError::Other {
                        line,
                        source: Box::new(e),
                    })));
                }
            }
        }
        Ok(Some(Ok(RawRecord::new(line, self.names.clone(), values))))
    }

    /// Consume up to `lines_to_skip` physical lines. Returns `false` at end of file.
    fn skip_lines(&mut self, file: &mut BufReader<File>) -> Result<bool, CsvSourceError> {
        let mut discarded = Vec::new();
        while self.line_offset < self.lines_to_skip as u64 {
            discarded.clear();
            let n = file
                .read_until(b'\n', &mut discarded)
                .map_err(|source| CsvSourceError::Open {
                    path: self.path.clone(),
                    source,
                })?;
            if n == 0 {
                return Ok(false);
            }
            self.line_offset += 1;
        }
        Ok(true)
    }
}

impl RecordSource for CsvRecordSource {
    fn open(&mut self) -> Result<(), BatchError> {
        if self.state != State::New {
            return Err(CsvSourceError::State("cannot be reopened").into());
        }
        let file = File::open(&self.path).map_err(|source| CsvSourceError::Open {
            path: self.path.clone(),
            source,
        })?;
        let mut file = BufReader::new(file);
        let more = self.skip_lines(&mut file)?;

        self.reader = Some(self.builder.from_reader(file));
        self.state = if more { State::Open } else { State::Exhausted };
        info!(path = %self.path.display(), skipped = self.line_offset, "Opened CSV source");
        Ok(())
    }

    fn read(&mut self) -> Result<Option<SourceRecord>, BatchError> {
        match self.state {
            State::New => Err(CsvSourceError::State("read before open").into()),
            State::Exhausted | State::Closed => Ok(None),
            State::Open => {
                let record = self.next_record()?;
                if record.is_none() {
                    debug!(path = %self.path.display(), last_line = self.last_line, "CSV source exhausted");
                    self.state = State::Exhausted;
                }
                Ok(record)
            }
        }
    }

    fn close(&mut self) -> Result<(), BatchError> {
        self.reader = None;
        self.state = State::Closed;
        Ok(())
    }

    fn name(&self) -> &str {
        "csv"
    }
}
