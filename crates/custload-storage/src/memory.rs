//! In-memory customer store.
//!
//! Keeps committed customers in RAM, keyed by id.
//! Useful for tests and dry runs that don't need persistence.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use custload_core::{BatchError, Customer, Sink, SinkTransaction, WriteError};

use crate::{CustomerStore, StorageError};

/// In-memory customer store.
///
/// All data is lost when the process exits.
#[derive(Default, Clone)]
pub struct InMemoryCustomerStore {
    customers: Arc<Mutex<HashMap<i64, Customer>>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every stored customer.
    pub fn clear(&self) {
        self.customers.lock().unwrap().clear();
    }
}

#[async_trait]
impl Sink<Customer> for InMemoryCustomerStore {
    async fn begin(&self) -> Result<Box<dyn SinkTransaction<Customer>>, BatchError> {
        Ok(Box::new(MemoryTransaction {
            customers: self.customers.clone(),
            staged: Vec::new(),
        }))
    }

    fn name(&self) -> &str {
        "memory-store"
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn get(&self, id: i64) -> Result<Option<Customer>, StorageError> {
        Ok(self.customers.lock().unwrap().get(&id).cloned())
    }

    async fn all(&self) -> Result<Vec<Customer>, StorageError> {
        let mut all: Vec<Customer> = self.customers.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|c| c.id);
        Ok(all)
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.customers.lock().unwrap().len() as u64)
    }
}

struct MemoryTransaction {
    customers: Arc<Mutex<HashMap<i64, Customer>>>,
    staged: Vec<Customer>,
}

#[async_trait]
impl SinkTransaction<Customer> for MemoryTransaction {
    async fn write(&mut self, item: &Customer) -> Result<(), WriteError> {
        self.staged.push(item.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BatchError> {
        let this = *self;
        let n = this.staged.len();
        let mut customers = this.customers.lock().unwrap();
        for customer in this.staged {
            customers.insert(customer.id, customer);
        }
        debug!(customers = n, total = customers.len(), "chunk committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), BatchError> {
        debug!(discarded = self.staged.len(), "chunk rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(id: i64, email: &str) -> Customer {
        Customer {
            id,
            first_name: "F".into(),
            last_name: "L".into(),
            email: email.into(),
            gender: "M".into(),
            contact_no: "1".into(),
            country: "United States".into(),
            dob: "2000-01-01".into(),
        }
    }

    #[tokio::test]
    async fn commit_makes_writes_visible() {
        let store = InMemoryCustomerStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.write(&customer(2, "b")).await.unwrap();
        tx.write(&customer(1, "a")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        tx.commit().await.unwrap();
        let ids: Vec<i64> = store.all().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = InMemoryCustomerStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.write(&customer(1, "a")).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store.get(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_upserts_by_id() {
        let store = InMemoryCustomerStore::new();
        for email in ["old", "new"] {
            let mut tx = store.begin().await.unwrap();
            tx.write(&customer(7, email)).await.unwrap();
            tx.commit().await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get(7).await.unwrap().unwrap().email, "new");
    }
}
