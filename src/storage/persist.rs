//! Time-bounded store access.
//!
//! Stage writes are snapshots, not the authoritative state: a failed or slow
//! write is logged, counted and dropped, and never reaches
//! `PipelineState::errors`. Reads that a run depends on go through
//! [`bounded`] and fail instead.

use std::future::Future;
use std::time::Duration;

use super::store::{Record, RecordStore, StoreError, Table};
use crate::metrics::MetricsCollector;

/// Awaits a store operation for at most `timeout`.
pub async fn bounded<T, F>(timeout: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(timeout, operation)
        .await
        .unwrap_or(Err(StoreError::Timeout(timeout)))
}

/// Inserts `record` within `timeout`. Returns the stored record, or `None`
/// when the write failed.
pub async fn persist_best_effort(
    store: &dyn RecordStore,
    table: Table,
    record: Record,
    timeout: Duration,
) -> Option<Record> {
    match bounded(timeout, store.insert(table, record)).await {
        Ok(stored) => Some(stored),
        Err(e) => {
            tracing::warn!(table = %table, error = %e, "Best-effort store write failed, continuing");
            MetricsCollector::new().record_store_failure(table.name());
            None
        }
    }
}
