//! custload-core — chunk-oriented batch engine for bulk record import.
//!
//! # Architecture
//!
//! ```text
//! JobBuilder → Job
//!                └── ChunkStep (built by StepBuilder)
//!                      ├── RecordSource    (raw lines, pulled under one lock)
//!                      ├── LineMapper      (raw line → record)
//!                      ├── ItemProcessor   (filter / transform)
//!                      ├── Sink            (one transaction per chunk)
//!                      ├── SkipPolicy + SkipCounter (skip decisions, shared limit)
//!                      └── SkipListeners   (skip / fatal notifications)
//! ```

pub mod builder;
pub mod config;
pub mod customer;
pub mod error;
pub mod execution;
pub mod job;
pub mod listener;
pub mod mapper;
pub mod processor;
pub mod sink;
pub mod skip;
pub mod source;
pub mod step;
pub mod types;

pub use builder::StepBuilder;
pub use config::{StepConfig, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY_LIMIT};
pub use customer::{Customer, CUSTOMER_FIELDS, DEFAULT_COUNTRY};
pub use error::{BatchError, BoxError, ItemError, MappingError, ProcessError, WriteError};
pub use execution::{JobExecution, StepExecutionResult};
pub use job::{Job, JobBuilder, Step};
pub use listener::{LoggingSkipListener, SkipListener, SkipListeners};
pub use mapper::{CustomerLineMapper, LineMapper};
pub use processor::{CountryFilter, ItemProcessor, PassThrough};
pub use sink::{MemorySink, Sink, SinkTransaction};
pub use skip::{AlwaysSkip, NeverSkip, NumberFormatSkipPolicy, SkipCounter, SkipPolicy};
pub use source::{MemorySource, RecordSource, SourceRecord};
pub use step::{Chunk, ChunkStep};
pub use types::{BatchStatus, ChunkState, RawRecord, Stage};
