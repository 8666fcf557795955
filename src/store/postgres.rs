use async_trait::async_trait;
use chrono::Utc;
use diesel::dsl::sql;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text};
use diesel::upsert::excluded;
use serde_json::Value;

use super::{StoreError, StoreResult, TableStore};
use crate::db::PgPool;
use crate::schema::{entity_row_index, entity_rows, entity_tables};

/// Postgres-backed table store. Every logical table shares `entity_rows`;
/// `entity_row_index` maps `(table, row)` to its current partition.
#[derive(Clone)]
pub struct PgTableStore {
    pool: PgPool,
}

impl PgTableStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut PgConnection) -> QueryResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| StoreError::Unavailable(format!("database pool error: {err}")))?;
            f(&mut conn).map_err(StoreError::from)
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("database task panicked: {err}")))?
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        StoreError::Unavailable(value.to_string())
    }
}

fn load_row(
    conn: &mut PgConnection,
    table: &str,
    partition: &str,
    row: &str,
) -> QueryResult<Option<Value>> {
    entity_rows::table
        .filter(entity_rows::table_name.eq(table))
        .filter(entity_rows::partition_key.eq(partition))
        .filter(entity_rows::row_key.eq(row))
        .select(entity_rows::data)
        .first::<Value>(conn)
        .optional()
}

#[async_trait]
impl TableStore for PgTableStore {
    async fn create_table(&self, table: &str) -> StoreResult<()> {
        let name = table.to_string();
        let inserted = self
            .run(move |conn| {
                diesel::insert_into(entity_tables::table)
                    .values(entity_tables::name.eq(&name))
                    .on_conflict_do_nothing()
                    .execute(conn)
            })
            .await?;
        if inserted == 0 {
            return Err(StoreError::Conflict(table.to_string()));
        }
        Ok(())
    }

    async fn upsert(
        &self,
        table: &str,
        partition: &str,
        row: &str,
        record: Value,
    ) -> StoreResult<()> {
        let (table, partition, row) = (table.to_string(), partition.to_string(), row.to_string());
        self.run(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::insert_into(entity_rows::table)
                    .values((
                        entity_rows::table_name.eq(&table),
                        entity_rows::partition_key.eq(&partition),
                        entity_rows::row_key.eq(&row),
                        entity_rows::data.eq(&record),
                        entity_rows::updated_at.eq(Utc::now()),
                    ))
                    .on_conflict((
                        entity_rows::table_name,
                        entity_rows::partition_key,
                        entity_rows::row_key,
                    ))
                    .do_update()
                    .set((
                        entity_rows::data.eq(excluded(entity_rows::data)),
                        entity_rows::updated_at.eq(excluded(entity_rows::updated_at)),
                    ))
                    .execute(conn)?;

                diesel::insert_into(entity_row_index::table)
                    .values((
                        entity_row_index::table_name.eq(&table),
                        entity_row_index::row_key.eq(&row),
                        entity_row_index::partition_key.eq(&partition),
                    ))
                    .on_conflict((entity_row_index::table_name, entity_row_index::row_key))
                    .do_update()
                    .set(entity_row_index::partition_key.eq(excluded(entity_row_index::partition_key)))
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    async fn get(&self, table: &str, partition: &str, row: &str) -> StoreResult<Option<Value>> {
        let (table, partition, row) = (table.to_string(), partition.to_string(), row.to_string());
        self.run(move |conn| load_row(conn, &table, &partition, &row))
            .await
    }

    async fn get_by_row(&self, table: &str, row: &str) -> StoreResult<Option<Value>> {
        let (table, row) = (table.to_string(), row.to_string());
        self.run(move |conn| {
            let partition: Option<String> = entity_row_index::table
                .filter(entity_row_index::table_name.eq(&table))
                .filter(entity_row_index::row_key.eq(&row))
                .select(entity_row_index::partition_key)
                .first(conn)
                .optional()?;
            match partition {
                Some(partition) => load_row(conn, &table, &partition, &row),
                None => Ok(None),
            }
        })
        .await
    }

    async fn scan_partition(&self, table: &str, partition: &str) -> StoreResult<Vec<Value>> {
        let (table, partition) = (table.to_string(), partition.to_string());
        self.run(move |conn| {
            entity_rows::table
                .filter(entity_rows::table_name.eq(&table))
                .filter(entity_rows::partition_key.eq(&partition))
                .order(entity_rows::row_key.asc())
                .select(entity_rows::data)
                .load::<Value>(conn)
        })
        .await
    }

    async fn find_by_field(
        &self,
        table: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Value>> {
        let (table, field, value) = (table.to_string(), field.to_string(), value.to_string());
        self.run(move |conn| {
            entity_rows::table
                .filter(entity_rows::table_name.eq(&table))
                .filter(
                    sql::<Bool>("data ->> ")
                        .bind::<Text, _>(field)
                        .sql(" = ")
                        .bind::<Text, _>(value),
                )
                .select(entity_rows::data)
                .load::<Value>(conn)
        })
        .await
    }

    async fn delete(&self, table: &str, partition: &str, row: &str) -> StoreResult<()> {
        let (table, partition, row) = (table.to_string(), partition.to_string(), row.to_string());
        self.run(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::delete(
                    entity_rows::table
                        .filter(entity_rows::table_name.eq(&table))
                        .filter(entity_rows::partition_key.eq(&partition))
                        .filter(entity_rows::row_key.eq(&row)),
                )
                .execute(conn)?;
                diesel::delete(
                    entity_row_index::table
                        .filter(entity_row_index::table_name.eq(&table))
                        .filter(entity_row_index::row_key.eq(&row))
                        .filter(entity_row_index::partition_key.eq(&partition)),
                )
                .execute(conn)?;
                Ok(())
            })
        })
        .await
    }
}
