//! SQLite customer store.
//!
//! Persists customers to a single SQLite file, one SQL transaction per chunk.
//! Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use custload_storage::sqlite::SqliteCustomerStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteCustomerStore::open("./customers.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteCustomerStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use custload_core::{BatchError, Customer, Sink, SinkTransaction, WriteError};

use crate::{CustomerStore, StorageError};

const UPSERT: &str = "INSERT INTO customers
        (id, first_name, last_name, email, gender, contact_no, country, dob, updated_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(id) DO UPDATE SET
        first_name = excluded.first_name,
        last_name  = excluded.last_name,
        email      = excluded.email,
        gender     = excluded.gender,
        contact_no = excluded.contact_no,
        country    = excluded.country,
        dob        = excluded.dob,
        updated_at = excluded.updated_at";

const SELECT: &str =
    "SELECT id, first_name, last_name, email, gender, contact_no, country, dob FROM customers";

/// SQLite-backed customer store.
#[derive(Clone)]
pub struct SqliteCustomerStore {
    pool: SqlitePool,
}

impl SqliteCustomerStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./customers.db"`) or a full
    /// SQLite URL (`"sqlite:./customers.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .map_err(|e| StorageError::Connect(e.to_string()))?;

        let store = Self { pool };
        store.init_schema(true).await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Limited to one connection, since every connection to `:memory:` is a
    /// separate database. All data is lost when the pool is dropped.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StorageError::Connect(e.to_string()))?;

        let store = Self { pool };
        store.init_schema(false).await?;
        Ok(store)
    }

    /// Create the customers table and, for files, enable WAL mode.
    async fn init_schema(&self, wal: bool) -> Result<(), StorageError> {
        if wal {
            sqlx::query("PRAGMA journal_mode=WAL;")
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Schema(e.to_string()))?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS customers (
                id         INTEGER PRIMARY KEY,
                first_name TEXT    NOT NULL,
                last_name  TEXT    NOT NULL,
                email      TEXT    NOT NULL,
                gender     TEXT    NOT NULL,
                contact_no TEXT    NOT NULL,
                country    TEXT    NOT NULL,
                dob        TEXT    NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Schema(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_customers_email ON customers (email);")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Schema(e.to_string()))?;

        Ok(())
    }

    /// The underlying pool, for callers that need ad-hoc queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn customer_from_row(row: &SqliteRow) -> Customer {
    Customer {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        gender: row.get("gender"),
        contact_no: row.get("contact_no"),
        country: row.get("country"),
        dob: row.get("dob"),
    }
}

/// Split driver failures into constraint violations and everything else.
fn write_error(id: i64, e: sqlx::Error) -> WriteError {
    match &e {
        sqlx::Error::Database(db) if !matches!(db.kind(), ErrorKind::Other) => {
            WriteError::Constraint {
                id: id.to_string(),
                reason: db.message().to_string(),
            }
        }
        _ => WriteError::Storage(e.to_string()),
    }
}

#[async_trait]
impl Sink<Customer> for SqliteCustomerStore {
    async fn begin(&self) -> Result<Box<dyn SinkTransaction<Customer>>, BatchError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BatchError::Resource(format!("cannot begin transaction: {e}")))?;
        Ok(Box::new(SqliteTransaction { tx, written: 0 }))
    }

    fn name(&self) -> &str {
        "sqlite-store"
    }
}

#[async_trait]
impl CustomerStore for SqliteCustomerStore {
    async fn get(&self, id: i64) -> Result<Option<Customer>, StorageError> {
        let row = sqlx::query(&format!("{SELECT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(row.as_ref().map(customer_from_row))
    }

    async fn all(&self) -> Result<Vec<Customer>, StorageError> {
        let rows = sqlx::query(&format!("{SELECT} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(rows.iter().map(customer_from_row).collect())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM customers")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
    written: u64,
}

#[async_trait]
impl SinkTransaction<Customer> for SqliteTransaction {
    async fn write(&mut self, item: &Customer) -> Result<(), WriteError> {
        sqlx::query(UPSERT)
            .bind(item.id)
            .bind(&item.first_name)
            .bind(&item.last_name)
            .bind(&item.email)
            .bind(&item.gender)
            .bind(&item.contact_no)
            .bind(&item.country)
            .bind(&item.dob)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_error(item.id, e))?;
        self.written += 1;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BatchError> {
        let written = self.written;
        self.tx
            .commit()
            .await
            .map_err(|e| BatchError::Resource(e.to_string()))?;
        debug!(customers = written, "chunk committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), BatchError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| BatchError::Resource(e.to_string()))?;
        debug!("chunk rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(id: i64, email: &str) -> Customer {
        Customer {
            id,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            gender: "Female".into(),
            contact_no: "555-0100".into(),
            country: "United States".into(),
            dob: "1815-12-10".into(),
        }
    }

    async fn save(store: &SqliteCustomerStore, customers: &[Customer]) {
        let mut tx = store.begin().await.unwrap();
        for c in customers {
            tx.write(c).await.unwrap();
        }
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn commit_and_query() {
        let store = SqliteCustomerStore::in_memory().await.unwrap();
        save(&store, &[customer(2, "b@x"), customer(1, "a@x")]).await;

        assert_eq!(store.count().await.unwrap(), 2);
        let all = store.all().await.unwrap();
        assert_eq!(all[0].id, 1);
        assert_eq!(all[1], customer(2, "b@x"));
        assert!(store.get(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let store = SqliteCustomerStore::in_memory().await.unwrap();
        save(&store, &[customer(1, "old@x")]).await;
        save(&store, &[customer(1, "new@x")]).await;

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get(1).await.unwrap().unwrap().email, "new@x");
    }

    #[tokio::test]
    async fn rollback_discards_chunk() {
        let store = SqliteCustomerStore::in_memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.write(&customer(1, "a@x")).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.db");
        let path = path.to_str().unwrap();

        let store = SqliteCustomerStore::open(path).await.unwrap();
        save(&store, &[customer(5, "e@x")]).await;
        store.pool().close().await;

        let reopened = SqliteCustomerStore::open(path).await.unwrap();
        assert_eq!(reopened.get(5).await.unwrap().unwrap().email, "e@x");
    }

    #[tokio::test]
    async fn constraint_violation_maps_to_constraint_error() {
        let store = SqliteCustomerStore::in_memory().await.unwrap();
        sqlx::query("CREATE UNIQUE INDEX uq_email ON customers (email)")
            .execute(store.pool())
            .await
            .unwrap();
        save(&store, &[customer(1, "same@x")]).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.write(&customer(2, "same@x")).await.unwrap_err();
        assert!(matches!(err, WriteError::Constraint { ref id, .. } if id == "2"));
        tx.rollback().await.unwrap();
    }
}
