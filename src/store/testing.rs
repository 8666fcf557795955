use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use super::{MemoryTableStore, StoreError, StoreResult, TableStore};

/// Memory backend that behaves like a remote one: every call yields to the
/// scheduler first, and the next `failing_deletes` deletes fail.
#[derive(Default)]
pub struct RemoteLikeStore {
    inner: MemoryTableStore,
    failing_deletes: AtomicUsize,
}

impl RemoteLikeStore {
    pub fn fail_next_deletes(&self, count: usize) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl TableStore for RemoteLikeStore {
    async fn create_table(&self, table: &str) -> StoreResult<()> {
        tokio::task::yield_now().await;
        self.inner.create_table(table).await
    }

    async fn upsert(
        &self,
        table: &str,
        partition: &str,
        row: &str,
        record: Value,
    ) -> StoreResult<()> {
        tokio::task::yield_now().await;
        self.inner.upsert(table, partition, row, record).await
    }

    async fn get(&self, table: &str, partition: &str, row: &str) -> StoreResult<Option<Value>> {
        tokio::task::yield_now().await;
        self.inner.get(table, partition, row).await
    }

    async fn get_by_row(&self, table: &str, row: &str) -> StoreResult<Option<Value>> {
        tokio::task::yield_now().await;
        self.inner.get_by_row(table, row).await
    }

    async fn scan_partition(&self, table: &str, partition: &str) -> StoreResult<Vec<Value>> {
        tokio::task::yield_now().await;
        self.inner.scan_partition(table, partition).await
    }

    async fn find_by_field(
        &self,
        table: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Value>> {
        tokio::task::yield_now().await;
        self.inner.find_by_field(table, field, value).await
    }

    async fn delete(&self, table: &str, partition: &str, row: &str) -> StoreResult<()> {
        tokio::task::yield_now().await;
        let fail = self
            .failing_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.delete(table, partition, row).await
    }
}
