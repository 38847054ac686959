//! custload-storage — customer stores usable as chunk sinks.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)
//!
//! Every backend upserts by customer id and makes a chunk's writes visible
//! only when its transaction commits.

use async_trait::async_trait;
use custload_core::{Customer, Sink};

pub mod error;
#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::StorageError;
#[cfg(feature = "memory")]
pub use memory::InMemoryCustomerStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCustomerStore;

/// Read side of a customer store.
#[async_trait]
pub trait CustomerStore: Sink<Customer> {
    async fn get(&self, id: i64) -> Result<Option<Customer>, StorageError>;

    /// Every stored customer, ordered by id.
    async fn all(&self) -> Result<Vec<Customer>, StorageError>;

    async fn count(&self) -> Result<u64, StorageError>;
}
