//! Record store contract.
//!
//! The pipeline treats persistence as a table-scoped document store: records
//! are JSON objects keyed by a string `id`. [`MemoryStore`](super::MemoryStore)
//! and [`PgStore`](super::PgStore) both implement [`RecordStore`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::migrations::MigrationError;

/// A stored document. Always carries a string `id` once persisted.
pub type Record = serde_json::Map<String, Value>;

/// Tables the compliance backend reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Regulations,
    Findings,
    ActionItems,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Regulations, Table::Findings, Table::ActionItems];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Regulations => "regulation_diffs",
            Table::Findings => "findings",
            Table::ActionItems => "action_items",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Record not found: {table}/{id}")]
    NotFound { table: Table, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    pub fn not_found(table: Table, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            table,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// One predicate over a top-level record field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { field: String, value: Value },
    In { field: String, values: Vec<Value> },
}

impl Predicate {
    fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Eq { field, value } => record.get(field) == Some(value),
            Predicate::In { field, values } => record
                .get(field)
                .map_or(false, |actual| values.contains(actual)),
        }
    }
}

/// Conjunction of predicates plus an optional row limit.
///
/// ```
/// use compliance_ai::storage::Filter;
///
/// let filter = Filter::new().eq("regulation_id", "reg-1").with_limit(10);
/// assert_eq!(filter.predicates().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
    limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `Filter::new().eq("id", id)`.
    pub fn by_id(id: impl Into<String>) -> Self {
        let id: String = id.into();
        Self::new().eq("id", id)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.predicates.push(Predicate::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }
}

/// Table-scoped CRUD over JSON records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records matching `filter`, in insertion order.
    async fn get(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError>;

    /// Stores `record` and returns it with its id. A supplied string `id` is
    /// kept (replacing any record with the same id); otherwise a UUID v4 is
    /// generated.
    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError>;

    /// Merges `fields` into the record with `id` and returns the result.
    /// The `id` field itself is never changed.
    async fn update(&self, table: Table, id: &str, fields: Record) -> Result<Record, StoreError>;
}

/// Id carried by a record, if it is a non-empty string.
pub fn record_id(record: &Record) -> Option<&str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Ensures `record` has an id, generating a UUID v4 when missing.
pub fn assign_id(mut record: Record) -> (String, Record) {
    let id = match record_id(&record) {
        Some(id) => id.to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    };
    record.insert("id".to_string(), Value::String(id.clone()));
    (id, record)
}
