//! Job file configuration (YAML) and its command-line overrides.
//!
//! ```yaml
//! job:
//!   name: importCustomers
//! input:
//!   path: customers.csv
//!   lines_to_skip: 1
//! step:
//!   chunk_size: 10
//!   concurrency_limit: 10
//!   skip_limit: 5
//! storage:
//!   backend: sqlite
//!   path: customers.db
//! log:
//!   level: info
//!   components:
//!     custload-core: debug
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use custload_core::{StepConfig, DEFAULT_COUNTRY};
use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobFileConfig {
    #[serde(default)]
    pub job: JobSection,
    #[serde(default)]
    pub input: InputSection,
    #[serde(default)]
    pub step: StepSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSection {
    #[serde(default = "default_job_name")]
    pub name: String,
}

fn default_job_name() -> String {
    "importCustomers".into()
}

impl Default for JobSection {
    fn default() -> Self {
        Self {
            name: default_job_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_lines_to_skip")]
    pub lines_to_skip: usize,
    /// Reject lines whose field count is not exactly eight.
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_comment")]
    pub comment: Option<char>,
}

fn default_delimiter() -> char {
    ','
}

fn default_lines_to_skip() -> usize {
    1
}

fn default_comment() -> Option<char> {
    Some('#')
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            path: None,
            delimiter: default_delimiter(),
            lines_to_skip: default_lines_to_skip(),
            strict: false,
            comment: default_comment(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSection {
    #[serde(flatten)]
    pub step: StepConfig,
    /// Only customers from this country are written.
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    DEFAULT_COUNTRY.into()
}

impl Default for StepSection {
    fn default() -> Self {
        Self {
            step: StepConfig::default(),
            country: default_country(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub backend: Backend,
    /// Database file for the `sqlite` backend.
    #[serde(default)]
    pub path: Option<String>,
}

/// Values given on the command line; each one replaces the file's value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub skip_limit: Option<u64>,
    pub lines_to_skip: Option<usize>,
    pub sqlite: Option<String>,
    pub log_level: Option<String>,
    pub log_json: bool,
}

impl JobFileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load the file if one was given, otherwise start from defaults.
    pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    pub fn apply(&mut self, o: Overrides) {
        if let Some(input) = o.input {
            self.input.path = Some(input);
        }
        if let Some(n) = o.chunk_size {
            self.step.step.chunk_size = n;
        }
        if let Some(n) = o.concurrency {
            self.step.step.concurrency_limit = n;
        }
        if let Some(n) = o.skip_limit {
            self.step.step.skip_limit = Some(n);
        }
        if let Some(n) = o.lines_to_skip {
            self.input.lines_to_skip = n;
        }
        if let Some(db) = o.sqlite {
            self.storage.backend = Backend::Sqlite;
            self.storage.path = Some(db);
        }
        if let Some(level) = o.log_level {
            self.log.level = level;
        }
        if o.log_json {
            self.log.json = true;
        }
    }

    pub fn input_path(&self) -> Result<&Path> {
        self.input
            .path
            .as_deref()
            .context("no input file: pass --input or set input.path in the config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = JobFileConfig::from_yaml("{}").unwrap();
        assert_eq!(cfg.job.name, "importCustomers");
        assert_eq!(cfg.input.delimiter, ',');
        assert_eq!(cfg.input.lines_to_skip, 1);
        assert_eq!(cfg.step.step.chunk_size, 10);
        assert_eq!(cfg.step.country, "United States");
        assert!(cfg.step.step.skip_limit.is_none());
        assert_eq!(cfg.storage.backend, Backend::Memory);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn parses_all_sections() {
        let yaml = r#"
job:
  name: nightly
input:
  path: data/customers.csv
  delimiter: ";"
  strict: true
step:
  chunk_size: 50
  concurrency_limit: 4
  skip_limit: 7
  country: Canada
storage:
  backend: sqlite
  path: out.db
log:
  level: debug
  json: true
  components:
    custload-core: trace
"#;
        let cfg = JobFileConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.job.name, "nightly");
        assert_eq!(cfg.input.delimiter, ';');
        assert!(cfg.input.strict);
        assert_eq!(cfg.step.step.chunk_size, 50);
        assert_eq!(cfg.step.step.concurrency_limit, 4);
        assert_eq!(cfg.step.step.skip_limit, Some(7));
        assert_eq!(cfg.step.country, "Canada");
        assert_eq!(cfg.storage.backend, Backend::Sqlite);
        assert_eq!(cfg.storage.path.as_deref(), Some("out.db"));
        assert!(cfg.log.json);
        assert_eq!(cfg.log.components["custload-core"], "trace");
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut cfg = JobFileConfig::from_yaml("step:\n  skip_limit: 1\n  chunk_size: 5\n").unwrap();
        cfg.apply(Overrides {
            input: Some("in.csv".into()),
            skip_limit: Some(9),
            sqlite: Some("x.db".into()),
            ..Default::default()
        });
        assert_eq!(cfg.step.step.skip_limit, Some(9));
        assert_eq!(cfg.step.step.chunk_size, 5);
        assert_eq!(cfg.storage.backend, Backend::Sqlite);
        assert_eq!(cfg.input_path().unwrap(), Path::new("in.csv"));
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(JobFileConfig::default().input_path().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        std::fs::write(&path, "job:\n  name: fromfile\n").unwrap();
        let cfg = JobFileConfig::resolve(Some(&path), Overrides::default()).unwrap();
        assert_eq!(cfg.job.name, "fromfile");
    }
}
