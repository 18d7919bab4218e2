//! In-process record store.
//!
//! Used by tests and by the server when no `DATABASE_URL` is configured.
//! Contents are lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{assign_id, record_id, Filter, Record, RecordStore, StoreError, Table};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in `table`.
    pub async fn count(&self, table: Table) -> usize {
        self.tables.read().await.get(&table).map_or(0, Vec::len)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&table) else {
            return Ok(Vec::new());
        };

        let matching = rows.iter().filter(|r| filter.matches(r)).cloned();
        Ok(match filter.limit() {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError> {
        let (id, record) = assign_id(record);
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();

        match rows.iter_mut().find(|r| record_id(r) == Some(id.as_str())) {
            Some(existing) => *existing = record.clone(),
            None => rows.push(record.clone()),
        }

        tracing::trace!(table = %table, id = %id, "Inserted record");
        Ok(record)
    }

    async fn update(&self, table: Table, id: &str, fields: Record) -> Result<Record, StoreError> {
        let mut tables = self.tables.write().await;
        let existing = tables
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|r| record_id(r) == Some(id)))
            .ok_or_else(|| StoreError::not_found(table, id))?;

        for (key, value) in fields {
            if key != "id" {
                existing.insert(key, value);
            }
        }

        Ok(existing.clone())
    }
}
