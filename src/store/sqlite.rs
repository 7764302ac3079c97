// SQLite store backend - stores each collection's records as JSON documents

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::{project, MediaStore, StoreError};
use crate::models::{Collection, Record};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database and run migrations
    pub async fn connect(database_url: &str) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            // WAL keeps readers unblocked while a scan writes
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_options)
            .await?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        tracing::info!("SQLite store ready at {}", database_url);
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(&self, collection: Collection, id: &str) -> Result<Record, StoreError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, data FROM records WHERE collection = ? AND id = ?")
                .bind(collection.name())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let (id, data) = row.ok_or(StoreError::NotFound)?;
        decode_record(id, &data)
    }
}

fn decode_record(id: String, data: &str) -> Result<Record, StoreError> {
    let fields: Map<String, Value> = serde_json::from_str(data)?;
    Ok(Record { id, fields })
}

fn into_object(payload: Value) -> Result<Map<String, Value>, StoreError> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidRecord(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field)
}

#[async_trait]
impl MediaStore for SqliteStore {
    async fn list_all(
        &self,
        collection: Collection,
        fields: &[&str],
    ) -> Result<Vec<Record>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, data FROM records WHERE collection = ? ORDER BY rowid")
                .bind(collection.name())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, data)| decode_record(id, &data).map(|r| project(r, fields)))
            .collect()
    }

    async fn find_first(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, StoreError> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"SELECT id, data FROM records
               WHERE collection = ? AND json_extract(data, ?) = ?
               ORDER BY rowid
               LIMIT 1"#,
        )
        .bind(collection.name())
        .bind(json_path(field))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, data)| decode_record(id, &data)).transpose()
    }

    async fn create(&self, collection: Collection, payload: Value) -> Result<Record, StoreError> {
        let fields = into_object(payload)?;
        let id = Uuid::new_v4().simple().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO records (id, collection, data, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(collection.name())
        .bind(serde_json::to_string(&fields)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Record { id, fields })
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        payload: Value,
    ) -> Result<Record, StoreError> {
        let changes = into_object(payload)?;
        let mut record = self.fetch(collection, id).await?;
        record.fields.extend(changes);

        sqlx::query("UPDATE records SET data = ?, updated_at = ? WHERE collection = ? AND id = ?")
            .bind(serde_json::to_string(&record.fields)?)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(collection.name())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(record)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
            .bind(collection.name())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
