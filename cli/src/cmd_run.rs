//! `custload run`: import a customer file into a store.

use std::sync::Arc;

use anyhow::{Context, Result};
use custload_core::{
    CountryFilter, Customer, CustomerLineMapper, JobBuilder, JobExecution, LoggingSkipListener,
    Sink, StepBuilder,
};
use custload_csv::CsvSourceBuilder;
use custload_storage::{CustomerStore, InMemoryCustomerStore, SqliteCustomerStore};
use serde::Serialize;
use tracing::info;

use crate::config::{Backend, JobFileConfig};

/// The store a run writes into.
#[derive(Clone)]
pub enum Store {
    Memory(Arc<InMemoryCustomerStore>),
    Sqlite(Arc<SqliteCustomerStore>),
}

impl Store {
    pub async fn open(config: &JobFileConfig) -> Result<Self> {
        match config.storage.backend {
            Backend::Memory => Ok(Self::Memory(Arc::new(InMemoryCustomerStore::new()))),
            Backend::Sqlite => {
                let path = config
                    .storage
                    .path
                    .as_deref()
                    .context("sqlite backend needs storage.path or --sqlite")?;
                let store = SqliteCustomerStore::open(path)
                    .await
                    .with_context(|| format!("cannot open sqlite store {path}"))?;
                Ok(Self::Sqlite(Arc::new(store)))
            }
        }
    }

    fn sink(&self) -> Arc<dyn Sink<Customer>> {
        match self {
            Self::Memory(s) => s.clone(),
            Self::Sqlite(s) => s.clone(),
        }
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(match self {
            Self::Memory(s) => s.count().await?,
            Self::Sqlite(s) => s.count().await?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub execution: JobExecution,
    /// Customers in the store after the run.
    pub stored: u64,
}

/// Build and run the import job described by `config`.
pub async fn execute(config: &JobFileConfig, store: &Store) -> Result<RunReport> {
    let input = config.input_path()?;
    let source = CsvSourceBuilder::new(input)
        .delimiter(config.input.delimiter)
        .comment(config.input.comment)
        .lines_to_skip(config.input.lines_to_skip)
        .names(Customer::field_names())
        .build()?;

    let step = StepBuilder::from_config(config.step.step.clone())
        .source(source)
        .mapper(CustomerLineMapper::new().strict(config.input.strict))
        .processor(CountryFilter::new(config.step.country.clone()))
        .sink(store.sink())
        .listener(Arc::new(LoggingSkipListener))
        .build()?;

    info!(input = %input.display(), job = %config.job.name, "Running import");
    let execution = JobBuilder::new(config.job.name.clone())
        .start(step)
        .build()
        .run()
        .await;
    let stored = store.count().await?;
    Ok(RunReport { execution, stored })
}

pub fn print(report: &RunReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let exec = &report.execution;
    println!("Job:      {} ({})", exec.job_name, exec.status);
    for step in &exec.steps {
        println!("Step:     {} ({}, {} ms)", step.step_name, step.status, step.duration_ms());
        println!("  read:      {}", step.items_read);
        println!("  filtered:  {}", step.items_filtered);
        println!("  written:   {}", step.items_written);
        println!(
            "  skipped:   {} (read {}, process {}, write {})",
            step.items_skipped, step.read_skips, step.process_skips, step.write_skips
        );
        println!(
            "  chunks:    {} committed, {} rolled back",
            step.chunks_committed, step.chunks_rolled_back
        );
        if let Some(msg) = &step.exit_message {
            println!("  failure:   {msg}");
        }
    }
    println!("Stored:   {}", report.stored);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use custload_core::BatchStatus;

    const CUSTOMERS: &str = "\
id,firstName,lastName,email,gender,contactNo,country,dob
1,A,B,a@x,M,111,United States,2000-01-01
2,C,D,c@x,F,222,Canada,2000-01-01
x,E,F,e@x,M,333,United States,2000-01-01
";

    fn config(dir: &tempfile::TempDir, skip_limit: u64, sqlite: Option<String>) -> JobFileConfig {
        let input = dir.path().join("customers.csv");
        std::fs::write(&input, CUSTOMERS).unwrap();
        JobFileConfig::resolve(
            None,
            Overrides {
                input: Some(input),
                skip_limit: Some(skip_limit),
                sqlite,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn imports_into_memory_store() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir, 5, None);
        let store = Store::open(&cfg).await.unwrap();

        let report = execute(&cfg, &store).await.unwrap();

        assert!(report.execution.is_completed());
        assert_eq!(report.stored, 1);
        let step = report.execution.last_step().unwrap();
        assert_eq!(step.read_skips, 1);
        assert_eq!(step.items_filtered, 1);
    }

    #[tokio::test]
    async fn zero_skip_limit_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir, 0, None);
        let store = Store::open(&cfg).await.unwrap();

        let report = execute(&cfg, &store).await.unwrap();

        assert_eq!(report.execution.status, BatchStatus::Failed);
        assert_eq!(report.stored, 0);
    }

    #[tokio::test]
    async fn rerun_into_sqlite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("out.db").to_str().unwrap().to_string();
        let cfg = config(&dir, 5, Some(db));

        for _ in 0..2 {
            let store = Store::open(&cfg).await.unwrap();
            let report = execute(&cfg, &store).await.unwrap();
            assert!(report.execution.is_completed());
            assert_eq!(report.stored, 1);
        }
    }

    #[tokio::test]
    async fn missing_skip_limit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&dir, 0, None);
        cfg.step.step.skip_limit = None;
        let store = Store::open(&cfg).await.unwrap();

        let err = execute(&cfg, &store).await.unwrap_err();
        assert!(err.to_string().contains("skip_limit"));
    }

    #[tokio::test]
    async fn json_report_has_counts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir, 5, None);
        let store = Store::open(&cfg).await.unwrap();
        let report = execute(&cfg, &store).await.unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["stored"], 1);
        assert_eq!(json["steps"][0]["items_written"], 1);
    }
}
