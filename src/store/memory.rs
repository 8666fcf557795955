use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{StoreError, StoreResult, TableStore};

/// In-process table store. Rows live in a per-table ordered map keyed by
/// `(partition, row)` with a `row -> partition` index beside it.
#[derive(Default)]
pub struct MemoryTableStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

#[derive(Default)]
struct MemoryTable {
    rows: BTreeMap<(String, String), Value>,
    row_index: HashMap<String, String>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held in `table`.
    pub async fn row_count(&self, table: &str) -> usize {
        let guard = self.tables.read().await;
        guard.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn create_table(&self, table: &str) -> StoreResult<()> {
        let mut guard = self.tables.write().await;
        if guard.contains_key(table) {
            return Err(StoreError::Conflict(table.to_string()));
        }
        guard.insert(table.to_string(), MemoryTable::default());
        Ok(())
    }

    async fn upsert(
        &self,
        table: &str,
        partition: &str,
        row: &str,
        record: Value,
    ) -> StoreResult<()> {
        let mut guard = self.tables.write().await;
        let entry = guard.entry(table.to_string()).or_default();
        entry
            .rows
            .insert((partition.to_string(), row.to_string()), record);
        entry
            .row_index
            .insert(row.to_string(), partition.to_string());
        Ok(())
    }

    async fn get(&self, table: &str, partition: &str, row: &str) -> StoreResult<Option<Value>> {
        let guard = self.tables.read().await;
        Ok(guard.get(table).and_then(|t| {
            t.rows
                .get(&(partition.to_string(), row.to_string()))
                .cloned()
        }))
    }

    async fn get_by_row(&self, table: &str, row: &str) -> StoreResult<Option<Value>> {
        let guard = self.tables.read().await;
        let Some(t) = guard.get(table) else {
            return Ok(None);
        };
        Ok(t.row_index
            .get(row)
            .and_then(|partition| t.rows.get(&(partition.clone(), row.to_string())))
            .cloned())
    }

    async fn scan_partition(&self, table: &str, partition: &str) -> StoreResult<Vec<Value>> {
        let guard = self.tables.read().await;
        Ok(guard
            .get(table)
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|((p, _), _)| p == partition)
                    .map(|(_, value)| value.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_by_field(
        &self,
        table: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Value>> {
        let guard = self.tables.read().await;
        Ok(guard
            .get(table)
            .map(|t| {
                t.rows
                    .values()
                    .filter(|record| field_matches(record.get(field), value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, table: &str, partition: &str, row: &str) -> StoreResult<()> {
        let mut guard = self.tables.write().await;
        if let Some(t) = guard.get_mut(table) {
            t.rows.remove(&(partition.to_string(), row.to_string()));
            if t.row_index.get(row).map(String::as_str) == Some(partition) {
                t.row_index.remove(row);
            }
        }
        Ok(())
    }
}

fn field_matches(field: Option<&Value>, expected: &str) -> bool {
    match field {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == expected,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn create_table_reports_conflict_on_second_call() -> anyhow::Result<()> {
        let store = MemoryTableStore::new();
        store.create_table("cards").await?;
        let second = store.create_table("cards").await;
        assert!(matches!(second, Err(StoreError::Conflict(name)) if name == "cards"));
        Ok(())
    }

    #[tokio::test]
    async fn rehomed_row_keeps_its_new_index_entry() -> anyhow::Result<()> {
        let store = MemoryTableStore::new();
        store
            .upsert("cards", "list-a", "card-1", json!({ "title": "a" }))
            .await?;
        store
            .upsert("cards", "list-b", "card-1", json!({ "title": "b" }))
            .await?;
        store.delete("cards", "list-a", "card-1").await?;

        let found = store.get_by_row("cards", "card-1").await?;
        assert_eq!(found, Some(json!({ "title": "b" })));
        assert_eq!(store.row_count("cards").await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn scan_only_returns_the_requested_partition() -> anyhow::Result<()> {
        let store = MemoryTableStore::new();
        store.upsert("lists", "board-1", "l1", json!({ "n": 1 })).await?;
        store.upsert("lists", "board-1", "l2", json!({ "n": 2 })).await?;
        store.upsert("lists", "board-2", "l3", json!({ "n": 3 })).await?;

        let rows = store.scan_partition("lists", "board-1").await?;
        assert_eq!(rows.len(), 2);
        assert!(store.scan_partition("missing", "board-1").await?.is_empty());
        Ok(())
    }

    #[test]
    fn field_matching_ignores_nulls() {
        assert!(field_matches(Some(&json!("abc")), "abc"));
        assert!(field_matches(Some(&json!(true)), "true"));
        assert!(!field_matches(Some(&Value::Null), "null"));
        assert!(!field_matches(None, "abc"));
    }
}
