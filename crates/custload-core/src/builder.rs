//! Fluent builder API for chunk steps.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use custload_core::{
//!     CountryFilter, Customer, CustomerLineMapper, MemorySink, MemorySource, StepBuilder,
//! };
//!
//! let source = MemorySource::from_delimited(Customer::field_names(), "1,A,B,a,M,1,United States,d", ',');
//! let step = StepBuilder::new("csv-step")
//!     .chunk_size(10)
//!     .concurrency_limit(10)
//!     .skip_limit(5)
//!     .source(source)
//!     .mapper(CustomerLineMapper::new())
//!     .processor(CountryFilter::default())
//!     .sink(Arc::new(MemorySink::<Customer>::new()))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

use crate::config::StepConfig;
use crate::error::BatchError;
use crate::listener::{SkipListener, SkipListeners};
use crate::mapper::LineMapper;
use crate::processor::{ItemProcessor, PassThrough};
use crate::sink::Sink;
use crate::skip::{NumberFormatSkipPolicy, SkipPolicy};
use crate::source::RecordSource;
use crate::step::ChunkStep;

/// Fluent builder for [`ChunkStep`].
pub struct StepBuilder<T> {
    config: StepConfig,
    source: Option<Box<dyn RecordSource>>,
    mapper: Option<Arc<dyn LineMapper<T>>>,
    processor: Arc<dyn ItemProcessor<T>>,
    sink: Option<Arc<dyn Sink<T>>>,
    policy: Arc<dyn SkipPolicy>,
    listeners: SkipListeners<T>,
}

impl<T> StepBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(StepConfig {
            name: name.into(),
            ..StepConfig::default()
        })
    }

    /// Start from an existing config (e.g. loaded from a file).
    pub fn from_config(config: StepConfig) -> Self {
        Self {
            config,
            source: None,
            mapper: None,
            processor: Arc::new(PassThrough),
            sink: None,
            policy: Arc::new(NumberFormatSkipPolicy),
            listeners: SkipListeners::new(),
        }
    }

    /// Set the number of raw items per chunk.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the number of chunks processed in parallel.
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    /// Set the maximum number of skips for the run. Required.
    pub fn skip_limit(mut self, limit: u64) -> Self {
        self.config.skip_limit = Some(limit);
        self
    }

    pub fn source(mut self, source: impl RecordSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn mapper(mut self, mapper: impl LineMapper<T> + 'static) -> Self {
        self.mapper = Some(Arc::new(mapper));
        self
    }

    /// Set the filter/transform stage. Defaults to [`PassThrough`].
    pub fn processor(mut self, processor: impl ItemProcessor<T> + 'static) -> Self {
        self.processor = Arc::new(processor);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn Sink<T>>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Defaults to [`NumberFormatSkipPolicy`].
    pub fn skip_policy(mut self, policy: impl SkipPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Register a skip listener. May be called more than once.
    pub fn listener(mut self, listener: Arc<dyn SkipListener<T>>) -> Self {
        self.listeners.register(listener);
        self
    }

    /// Validate the configuration and wire the step.
    pub fn build(self) -> Result<ChunkStep<T>, BatchError> {
        let skip_limit = self.config.validate()?;
        let missing = |what: &str| BatchError::Config(format!("step '{}' has no {what}", self.config.name));

        let source = self.source.ok_or_else(|| missing("source"))?;
        let mapper = self.mapper.ok_or_else(|| missing("mapper"))?;
        let sink = self.sink.ok_or_else(|| missing("sink"))?;

        Ok(ChunkStep {
            config: self.config,
            skip_limit,
            source,
            mapper,
            processor: self.processor,
            sink,
            policy: self.policy,
            listeners: self.listeners,
        })
    }
}
