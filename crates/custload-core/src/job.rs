//! Jobs: an ordered list of steps run one after another.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::execution::{JobExecution, StepExecutionResult};
use crate::types::BatchStatus;

/// A unit of work a job can run.
///
/// Steps are consumed by running them; a job runs each step at most once.
#[async_trait]
pub trait Step: Send {
    fn name(&self) -> &str;

    async fn execute(self: Box<Self>) -> StepExecutionResult;
}

/// A named sequence of steps. The first failed step stops the job.
pub struct Job {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Job {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order. Steps after a failed one are not started.
    pub async fn run(self) -> JobExecution {
        info!(job = %self.name, steps = self.steps.len(), "Starting job");

        let mut results = Vec::with_capacity(self.steps.len());
        let mut status = BatchStatus::Completed;
        for step in self.steps {
            let result = step.execute().await;
            let failed = !result.is_completed();
            results.push(result);
            if failed {
                status = BatchStatus::Failed;
                break;
            }
        }

        match status {
            BatchStatus::Completed => info!(job = %self.name, "Job completed"),
            BatchStatus::Failed => warn!(
                job = %self.name,
                reason = results.last().and_then(|r| r.exit_message.as_deref()).unwrap_or(""),
                "Job failed"
            ),
        }

        JobExecution {
            job_name: self.name,
            status,
            steps: results,
        }
    }
}

/// Fluent builder for [`Job`].
pub struct JobBuilder {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl JobBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: vec![],
        }
    }

    /// Set the first step.
    pub fn start(mut self, step: impl Step + 'static) -> Self {
        self.steps.insert(0, Box::new(step));
        self
    }

    /// Append a step after the ones already added.
    pub fn next(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn build(self) -> Job {
        Job {
            name: self.name,
            steps: self.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BatchError;
    use crate::execution::StepMetrics;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    struct Scripted {
        name: &'static str,
        fail: bool,
        ran: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Step for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(self: Box<Self>) -> StepExecutionResult {
            self.ran.lock().unwrap().push(self.name);
            if self.fail {
                StepExecutionResult::failed_to_start(self.name, BatchError::Resource("down".into()))
            } else {
                StepMetrics::default().finish(self.name.into(), Utc::now(), None)
            }
        }
    }

    fn step(name: &'static str, fail: bool, ran: &Arc<Mutex<Vec<&'static str>>>) -> Scripted {
        Scripted {
            name,
            fail,
            ran: ran.clone(),
        }
    }

    #[tokio::test]
    async fn runs_steps_in_order() {
        let ran = Arc::new(Mutex::new(vec![]));
        let job = JobBuilder::new("job")
            .next(step("b", false, &ran))
            .start(step("a", false, &ran))
            .build();
        assert_eq!(job.step_names(), vec!["a", "b"]);

        let exec = job.run().await;
        assert!(exec.is_completed());
        assert_eq!(exec.steps.len(), 2);
        assert_eq!(*ran.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn stops_at_first_failed_step() {
        let ran = Arc::new(Mutex::new(vec![]));
        let exec = JobBuilder::new("job")
            .start(step("a", true, &ran))
            .next(step("b", false, &ran))
            .build()
            .run()
            .await;
        assert_eq!(exec.status, BatchStatus::Failed);
        assert_eq!(exec.last_step().unwrap().step_name, "a");
        assert_eq!(*ran.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn empty_job_completes() {
        let exec = JobBuilder::new("empty").build().run().await;
        assert!(exec.is_completed());
        assert!(exec.last_step().is_none());
    }
}
