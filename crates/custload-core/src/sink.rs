//! Sink traits: where accepted records are persisted.
//!
//! Every chunk writes through its own [`SinkTransaction`]. Survivors of the
//! chunk are written one by one with `write` (the single "save" operation)
//! and the transaction is then either committed as one unit or rolled back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{BatchError, WriteError};

/// A durable store that accepts records in chunk-sized transactions.
#[async_trait]
pub trait Sink<T>: Send + Sync {
    /// Open a transaction for one chunk.
    ///
    /// Failure here means the store is unavailable and is always fatal.
    async fn begin(&self) -> Result<Box<dyn SinkTransaction<T>>, BatchError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        "sink"
    }
}

/// An open, chunk-scoped transaction.
#[async_trait]
pub trait SinkTransaction<T>: Send {
    /// Save (upsert by identity) one record inside the transaction.
    async fn write(&mut self, item: &T) -> Result<(), WriteError>;

    /// Make every successful `write` durable as one unit.
    async fn commit(self: Box<Self>) -> Result<(), BatchError>;

    /// Discard every `write` made in this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), BatchError>;
}

// ─── In-memory sink (for testing) ─────────────────────────────────────────────

type WriteCheck<T> = Arc<dyn Fn(&T) -> Option<WriteError> + Send + Sync>;

#[derive(Default)]
struct TxCounters {
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

/// Append-only in-memory sink for tests and dry runs.
///
/// Committed items are kept in commit order. An optional check can reject
/// individual writes to exercise write-stage failures. Clones share state.
pub struct MemorySink<T> {
    committed: Arc<Mutex<Vec<T>>>,
    counters: Arc<TxCounters>,
    check: Option<WriteCheck<T>>,
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self {
            committed: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(TxCounters::default()),
            check: None,
        }
    }
}

impl<T> Clone for MemorySink<T> {
    fn clone(&self) -> Self {
        Self {
            committed: self.committed.clone(),
            counters: self.counters.clone(),
            check: self.check.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> MemorySink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes for which `check` returns an error.
    pub fn failing_when<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> Option<WriteError> + Send + Sync + 'static,
    {
        self.check = Some(Arc::new(check));
        self
    }

    /// Snapshot of every committed item.
    pub fn items(&self) -> Vec<T> {
        self.committed.lock().unwrap().clone()
    }

    pub fn commit_count(&self) -> u64 {
        self.counters.commits.load(Ordering::Relaxed)
    }

    pub fn rollback_count(&self) -> u64 {
        self.counters.rollbacks.load(Ordering::Relaxed)
    }
}

struct MemorySinkTx<T> {
    staged: Vec<T>,
    committed: Arc<Mutex<Vec<T>>>,
    counters: Arc<TxCounters>,
    check: Option<WriteCheck<T>>,
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Sink<T> for MemorySink<T> {
    async fn begin(&self) -> Result<Box<dyn SinkTransaction<T>>, BatchError> {
        Ok(Box::new(MemorySinkTx {
            staged: Vec::new(),
            committed: self.committed.clone(),
            counters: self.counters.clone(),
            check: self.check.clone(),
        }))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> SinkTransaction<T> for MemorySinkTx<T> {
    async fn write(&mut self, item: &T) -> Result<(), WriteError> {
        if let Some(err) = self.check.as_ref().and_then(|check| check(item)) {
            return Err(err);
        }
        self.staged.push(item.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BatchError> {
        let this = *self;
        this.committed.lock().unwrap().extend(this.staged);
        this.counters.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), BatchError> {
        self.counters.rollbacks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_publishes_staged_items() {
        let sink = MemorySink::<u32>::new();
        let mut tx = sink.begin().await.unwrap();
        tx.write(&1).await.unwrap();
        tx.write(&2).await.unwrap();
        assert!(sink.items().is_empty());
        tx.commit().await.unwrap();
        assert_eq!(sink.items(), vec![1, 2]);
        assert_eq!(sink.commit_count(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_staged_items() {
        let sink = MemorySink::<u32>::new();
        let mut tx = sink.begin().await.unwrap();
        tx.write(&1).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(sink.items().is_empty());
        assert_eq!(sink.rollback_count(), 1);
    }

    #[tokio::test]
    async fn clones_share_committed_items() {
        let sink = MemorySink::<u32>::new();
        let view = sink.clone();
        let mut tx = sink.begin().await.unwrap();
        tx.write(&7).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(view.items(), vec![7]);
        assert_eq!(view.commit_count(), 1);
    }

    #[tokio::test]
    async fn check_rejects_writes() {
        let sink = MemorySink::<u32>::new()
            .failing_when(|v| (*v == 13).then(|| WriteError::Conflict { id: v.to_string() }));
        let mut tx = sink.begin().await.unwrap();
        assert!(tx.write(&12).await.is_ok());
        assert!(matches!(tx.write(&13).await, Err(WriteError::Conflict { .. })));
    }
}
