//! `custload check`: a dry run that maps and filters every line and writes nothing.

use anyhow::Result;
use custload_core::{
    CountryFilter, Customer, CustomerLineMapper, ItemError, ItemProcessor, LineMapper,
    NumberFormatSkipPolicy, RecordSource, SkipPolicy,
};
use custload_csv::CsvSourceBuilder;
use serde::Serialize;

use crate::config::JobFileConfig;

/// Rejections listed in full; the rest are only counted.
const MAX_LISTED: usize = 20;

#[derive(Debug, Default, Serialize)]
pub struct CheckReport {
    pub read: u64,
    pub accepted: u64,
    pub filtered: u64,
    pub rejected: u64,
    /// Rejections the default skip policy would skip.
    pub skippable: u64,
    pub rejections: Vec<Rejection>,
}

#[derive(Debug, Serialize)]
pub struct Rejection {
    pub line: u64,
    pub stage: String,
    pub skippable: bool,
    pub reason: String,
}

pub fn execute(config: &JobFileConfig) -> Result<CheckReport> {
    let mut source = CsvSourceBuilder::new(config.input_path()?)
        .delimiter(config.input.delimiter)
        .comment(config.input.comment)
        .lines_to_skip(config.input.lines_to_skip)
        .names(Customer::field_names())
        .build()?;
    let mapper = CustomerLineMapper::new().strict(config.input.strict);
    let filter = CountryFilter::new(config.step.country.clone());
    let policy = NumberFormatSkipPolicy;

    let mut report = CheckReport::default();
    source.open()?;
    let outcome = (|| -> Result<()> {
        while let Some(pulled) = source.read()? {
            report.read += 1;
            let line = match &pulled {
                Ok(raw) => raw.line,
                Err(e) => e.line(),
            };
            let result = pulled
                .and_then(|raw| mapper.map(&raw))
                .map_err(ItemError::from)
                .and_then(|c| filter.process(c).map_err(ItemError::from));
            match result {
                Ok(Some(_)) => report.accepted += 1,
                Ok(None) => report.filtered += 1,
                Err(e) => {
                    let skippable = policy.should_skip(&e, report.skippable);
                    report.rejected += 1;
                    if skippable {
                        report.skippable += 1;
                    }
                    if report.rejections.len() < MAX_LISTED {
                        report.rejections.push(Rejection {
                            line,
                            stage: e.stage().to_string(),
                            skippable,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    })();
    source.close()?;
    outcome?;
    Ok(report)
}

pub fn print(report: &CheckReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("Read:      {}", report.read);
    println!("Accepted:  {}", report.accepted);
    println!("Filtered:  {}", report.filtered);
    println!(
        "Rejected:  {} ({} skippable)",
        report.rejected, report.skippable
    );
    for r in &report.rejections {
        let kind = if r.skippable { "skip" } else { "fatal" };
        println!("  line {:>6} [{}/{}] {}", r.line, r.stage, kind, r.reason);
    }
    if report.rejected as usize > report.rejections.len() {
        println!("  ... {} more", report.rejected as usize - report.rejections.len());
    }
    Ok(())
}
