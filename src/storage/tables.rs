/*!
 * Table store: keyed entity collections with optimistic concurrency.
 *
 * Rows are addressed by (partition key, row key) within a named table. Every
 * successful write assigns a fresh version token; updates must present the
 * token they last read, or the wildcard token to force the replace through.
 */

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StorageError;

/// Version token assigned by the table store on every successful write.
///
/// Tokens are opaque; the only operations callers may rely on are equality
/// and the wildcard (`*`), which bypasses the concurrency check entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Etag(String);

impl Etag {
    pub const WILDCARD: &'static str = "*";

    /// The force token: matches any stored version.
    pub fn wildcard() -> Self {
        Etag(Self::WILDCARD.to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::WILDCARD
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn generate() -> Self {
        Etag(Uuid::new_v4().to_string())
    }
}

impl From<String> for Etag {
    fn from(value: String) -> Self {
        Etag(value)
    }
}

impl From<&str> for Etag {
    fn from(value: &str) -> Self {
        Etag(value.to_string())
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stored row: system metadata plus the caller's JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRow {
    pub partition_key: String,
    pub row_key: String,
    /// Assigned by the store; empty on rows that have never been written.
    pub etag: Etag,
    /// Last-modified instant, assigned by the store.
    pub timestamp: Option<DateTime<Utc>>,
    pub data: serde_json::Value,
}

impl TableRow {
    pub fn new(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            etag: Etag::default(),
            timestamp: None,
            data,
        }
    }
}

#[async_trait]
pub trait TableStore: Send + Sync {
    /// Lazily creates the table; repeated calls are no-ops.
    async fn create_table_if_absent(&self, table: &str) -> Result<(), StorageError>;

    /// All rows of a table in store-defined order. An unknown or empty table
    /// yields an empty vector, never an error.
    async fn list_rows(&self, table: &str) -> Result<Vec<TableRow>, StorageError>;

    /// The matching row, or `None` when the store reports missing-resource.
    async fn get_row(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableRow>, StorageError>;

    /// Inserts a new row and assigns its first version token. Fails with
    /// `DuplicateKey` when the (partition, row) pair already exists.
    async fn insert_row(&self, table: &str, row: TableRow) -> Result<TableRow, StorageError>;

    /// Replaces the stored row's payload entirely (no merge). `expected` must
    /// equal the stored token, or be the wildcard; otherwise `Conflict`.
    async fn update_row(
        &self,
        table: &str,
        row: TableRow,
        expected: &Etag,
    ) -> Result<TableRow, StorageError>;

    /// Removes a row. Fails with `NotFound` when the row is absent.
    async fn delete_row(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError>;
}

type RowMap = BTreeMap<(String, String), TableRow>;

/// In-memory table store carrying the full version-token contract.
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    tables: RwLock<HashMap<String, RowMap>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn create_table_if_absent(&self, table: &str) -> Result<(), StorageError> {
        let mut tables = self.tables.write().unwrap();
        tables.entry(table.to_string()).or_default();
        Ok(())
    }

    async fn list_rows(&self, table: &str) -> Result<Vec<TableRow>, StorageError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_row(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<TableRow>, StorageError> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .get(table)
            .and_then(|rows| rows.get(&(partition_key.to_string(), row_key.to_string())))
            .cloned())
    }

    async fn insert_row(&self, table: &str, mut row: TableRow) -> Result<TableRow, StorageError> {
        let mut tables = self.tables.write().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let key = (row.partition_key.clone(), row.row_key.clone());

        if rows.contains_key(&key) {
            return Err(StorageError::duplicate_key(table, &key.0, &key.1));
        }

        row.etag = Etag::generate();
        row.timestamp = Some(Utc::now());
        rows.insert(key, row.clone());
        Ok(row)
    }

    async fn update_row(
        &self,
        table: &str,
        mut row: TableRow,
        expected: &Etag,
    ) -> Result<TableRow, StorageError> {
        let mut tables = self.tables.write().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let key = (row.partition_key.clone(), row.row_key.clone());

        let stored = rows
            .get(&key)
            .ok_or_else(|| StorageError::not_found(table, &key.0, &key.1))?;

        if !expected.is_wildcard() && *expected != stored.etag {
            return Err(StorageError::conflict(table, &key.0, &key.1));
        }

        row.etag = Etag::generate();
        row.timestamp = Some(Utc::now());
        rows.insert(key, row.clone());
        Ok(row)
    }

    async fn delete_row(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.write().unwrap();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::not_found(table, partition_key, row_key))?;

        rows.remove(&(partition_key.to_string(), row_key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(table, partition_key, row_key))
    }
}
