//! Skip listeners + registry.
//!
//! Listeners observe every skip decision of a step, by stage. Read skips
//! carry no item (the line never became a record); process and write skips
//! carry the record that was dropped.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::error::ItemError;
use crate::types::Stage;

/// Observer of skip decisions.
///
/// Callbacks run on the worker that hit the failure, before the step moves
/// on or aborts. They must not block for long.
pub trait SkipListener<T>: Send + Sync {
    /// A line failed to map and was skipped.
    fn on_skip_in_read(&self, _error: &ItemError) {}

    /// An item failed in the filter/transform stage and was skipped.
    fn on_skip_in_process(&self, _item: &T, _error: &ItemError) {}

    /// An item was refused by the sink and was skipped.
    fn on_skip_in_write(&self, _item: &T, _error: &ItemError) {}

    /// A failure was not skipped and is about to end the step.
    fn on_fatal(&self, _stage: Stage, _item: Option<&T>, _error: &ItemError) {}
}

/// Logs every skip through `tracing`, rendering items as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSkipListener;

impl LoggingSkipListener {
    fn render<T: Serialize>(item: &T) -> String {
        serde_json::to_string(item).unwrap_or_else(|e| format!("<unserializable: {e}>"))
    }
}

impl<T: Serialize> SkipListener<T> for LoggingSkipListener {
    fn on_skip_in_read(&self, error: &ItemError) {
        info!(stage = "read", %error, "A failure on read");
    }

    fn on_skip_in_process(&self, item: &T, error: &ItemError) {
        info!(
            stage = "process",
            item = %Self::render(item),
            %error,
            "Item was skipped due to an exception"
        );
    }

    fn on_skip_in_write(&self, item: &T, error: &ItemError) {
        info!(
            stage = "write",
            item = %Self::render(item),
            %error,
            "A failure on write"
        );
    }

    fn on_fatal(&self, stage: Stage, item: Option<&T>, error: &ItemError) {
        let item = item.map(Self::render).unwrap_or_default();
        error!(%stage, item = %item, %error, "Failure is not skippable; aborting step");
    }
}

/// Fan-out to any number of listeners, in registration order.
pub struct SkipListeners<T> {
    listeners: Vec<Arc<dyn SkipListener<T>>>,
}

impl<T> SkipListeners<T> {
    pub fn new() -> Self {
        Self { listeners: vec![] }
    }

    pub fn register(&mut self, listener: Arc<dyn SkipListener<T>>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notify every listener of an accepted skip, routed by stage.
    pub fn skipped(&self, stage: Stage, item: Option<&T>, error: &ItemError) {
        for listener in &self.listeners {
            match (stage, item) {
                (Stage::Process, Some(item)) => listener.on_skip_in_process(item, error),
                (Stage::Write, Some(item)) => listener.on_skip_in_write(item, error),
                _ => listener.on_skip_in_read(error),
            }
        }
    }

    /// Notify every listener of a failure that ends the step.
    pub fn fatal(&self, stage: Stage, item: Option<&T>, error: &ItemError) {
        for listener in &self.listeners {
            listener.on_fatal(stage, item, error);
        }
    }
}

impl<T> Default for SkipListeners<T> {
    fn default() -> Self {
        Self::new()
    }
}
