pub mod memory;
pub mod postgres;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{Entity, ENTITY_TABLES};

pub use memory::MemoryTableStore;
pub use postgres::PgTableStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("table {0} already exists")]
    Conflict(String),
    #[error("malformed record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value table backend with `(partition, row)` addressing.
///
/// Records are JSON objects. Deleting an absent row is a no-op.
#[async_trait]
pub trait TableStore: Send + Sync + 'static {
    /// Creates `table`, failing with [`StoreError::Conflict`] when it already exists.
    async fn create_table(&self, table: &str) -> StoreResult<()>;

    async fn upsert(&self, table: &str, partition: &str, row: &str, record: Value)
        -> StoreResult<()>;

    async fn get(&self, table: &str, partition: &str, row: &str) -> StoreResult<Option<Value>>;

    /// Id-only lookup for callers that do not know the partition yet.
    async fn get_by_row(&self, table: &str, row: &str) -> StoreResult<Option<Value>>;

    async fn scan_partition(&self, table: &str, partition: &str) -> StoreResult<Vec<Value>>;

    /// Equality filter on a top-level field, compared by text representation.
    async fn find_by_field(&self, table: &str, field: &str, value: &str)
        -> StoreResult<Vec<Value>>;

    async fn delete(&self, table: &str, partition: &str, row: &str) -> StoreResult<()>;
}

/// Typed facade over a [`TableStore`].
#[derive(Clone)]
pub struct EntityStore {
    backend: Arc<dyn TableStore>,
}

impl EntityStore {
    pub fn new(backend: Arc<dyn TableStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTableStore::default()))
    }

    pub async fn ensure_tables(&self) -> StoreResult<()> {
        for table in ENTITY_TABLES {
            match self.backend.create_table(table).await {
                Ok(()) => tracing::debug!(table, "created table"),
                Err(StoreError::Conflict(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub async fn upsert<T: Entity>(&self, entity: &T) -> StoreResult<()> {
        let record = serde_json::to_value(entity)?;
        self.backend
            .upsert(T::TABLE, &entity.partition_key(), &entity.row_key(), record)
            .await
    }

    /// Writes every entity concurrently; each targets a distinct row.
    /// Not atomic: a failure can leave some rows written.
    pub async fn upsert_all<T: Entity>(&self, entities: &[T]) -> StoreResult<()> {
        try_join_all(entities.iter().map(|entity| self.upsert(entity))).await?;
        Ok(())
    }

    pub async fn get<T: Entity>(&self, partition: Uuid, row: Uuid) -> StoreResult<Option<T>> {
        self.backend
            .get(T::TABLE, &partition.to_string(), &row.to_string())
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn get_by_row<T: Entity>(&self, row: Uuid) -> StoreResult<Option<T>> {
        self.backend
            .get_by_row(T::TABLE, &row.to_string())
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn scan<T: Entity>(&self, partition: Uuid) -> StoreResult<Vec<T>> {
        self.backend
            .scan_partition(T::TABLE, &partition.to_string())
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Scans `partition` and splits its rows into those whose id index still
    /// points here and stale copies whose id has since moved to another
    /// partition.
    pub async fn scan_current<T: Entity>(&self, partition: Uuid) -> StoreResult<(Vec<T>, Vec<T>)> {
        let rows = self.scan::<T>(partition).await?;
        let homes = try_join_all(
            rows.iter()
                .map(|row| async move { self.backend.get_by_row(T::TABLE, &row.row_key()).await }),
        )
        .await?;

        let partition = partition.to_string();
        let mut current = Vec::with_capacity(rows.len());
        let mut stale = Vec::new();
        for (row, home) in rows.into_iter().zip(homes) {
            let moved_away = match home {
                Some(value) => decode::<T>(value)?.partition_key() != partition,
                None => false,
            };
            if moved_away {
                tracing::warn!(kind = T::KIND, row = %row.row_key(), %partition, "found stale row");
                stale.push(row);
            } else {
                current.push(row);
            }
        }
        Ok((current, stale))
    }

    pub async fn find_by_field<T: Entity>(&self, field: &str, value: &str) -> StoreResult<Vec<T>> {
        self.backend
            .find_by_field(T::TABLE, field, value)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn delete<T: Entity>(&self, partition: Uuid, row: Uuid) -> StoreResult<()> {
        self.backend
            .delete(T::TABLE, &partition.to_string(), &row.to_string())
            .await
    }

    pub async fn remove<T: Entity>(&self, entity: &T) -> StoreResult<()> {
        self.backend
            .delete(T::TABLE, &entity.partition_key(), &entity.row_key())
            .await
    }
}

fn decode<T: Entity>(value: Value) -> StoreResult<T> {
    Ok(serde_json::from_value(value)?)
}
