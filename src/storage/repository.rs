//! Typed access to compliance records over any [`RecordStore`].

use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::store::{Filter, Record, RecordStore, StoreError, Table};
use crate::compliance::{ActionItem, Finding, Regulation};

/// Serializes a domain value into a store record.
pub fn to_record<T: Serialize>(value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(
            <serde_json::Error as serde::ser::Error>::custom(format!(
                "expected a JSON object, got {}",
                other
            )),
        )),
    }
}

/// Deserializes a store record into a domain value.
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

fn from_records<T: DeserializeOwned>(records: Vec<Record>) -> Result<Vec<T>, StoreError> {
    records.into_iter().map(from_record).collect()
}

#[derive(Clone)]
pub struct ComplianceRepository {
    store: Arc<dyn RecordStore>,
}

impl ComplianceRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    async fn get_one<T: DeserializeOwned>(&self, table: Table, id: &str) -> Result<T, StoreError> {
        let record = self
            .store
            .get(table, &Filter::by_id(id).with_limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(table, id))?;
        from_record(record)
    }

    // Regulations

    /// Stores a regulation, stamping `published_date` with now when absent.
    pub async fn insert_regulation(&self, mut regulation: Regulation) -> Result<Regulation, StoreError> {
        if regulation.published_date.is_none() {
            regulation.published_date = Some(Utc::now().to_rfc3339());
        }
        let stored = self
            .store
            .insert(Table::Regulations, to_record(&regulation)?)
            .await?;
        from_record(stored)
    }

    pub async fn get_regulation(&self, id: &str) -> Result<Regulation, StoreError> {
        self.get_one(Table::Regulations, id).await
    }

    pub async fn list_regulations(&self) -> Result<Vec<Regulation>, StoreError> {
        from_records(self.store.get(Table::Regulations, &Filter::new()).await?)
    }

    // Findings

    pub async fn save_finding(&self, finding: &Finding) -> Result<Finding, StoreError> {
        let stored = self.store.insert(Table::Findings, to_record(finding)?).await?;
        from_record(stored)
    }

    pub async fn get_finding(&self, id: &str) -> Result<Finding, StoreError> {
        self.get_one(Table::Findings, id).await
    }

    /// All findings, or only those of one regulation.
    pub async fn list_findings(&self, regulation_id: Option<&str>) -> Result<Vec<Finding>, StoreError> {
        let filter = match regulation_id {
            Some(id) => Filter::new().eq("regulation_id", id),
            None => Filter::new(),
        };
        from_records(self.store.get(Table::Findings, &filter).await?)
    }

    // Action items

    pub async fn save_action_item(&self, item: &ActionItem) -> Result<ActionItem, StoreError> {
        let stored = self.store.insert(Table::ActionItems, to_record(item)?).await?;
        from_record(stored)
    }

    pub async fn list_action_items(&self) -> Result<Vec<ActionItem>, StoreError> {
        from_records(self.store.get(Table::ActionItems, &Filter::new()).await?)
    }

    pub async fn list_action_items_for_findings(
        &self,
        finding_ids: &[String],
    ) -> Result<Vec<ActionItem>, StoreError> {
        if finding_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::new().is_in("finding_id", finding_ids.iter().cloned());
        from_records(self.store.get(Table::ActionItems, &filter).await?)
    }

    /// Replaces the editable fields of an action item, keeping its id.
    pub async fn update_action_item(
        &self,
        id: &str,
        item: &ActionItem,
    ) -> Result<ActionItem, StoreError> {
        let mut fields = to_record(item)?;
        fields.remove("id");
        let updated = self.store.update(Table::ActionItems, id, fields).await?;
        from_record(updated)
    }
}
