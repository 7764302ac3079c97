// Remote store layer - typed access to the document collections the scanner mirrors into

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{Collection, Record};

pub mod pocketbase;
pub mod sqlite;

#[cfg(test)]
pub mod memory;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Operations the scanner needs from a remote document store.
///
/// Implementations are expected to already be authenticated with enough
/// privileges to read and write every collection in [`Collection`].
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Fetch every record in a collection, projected onto `fields` (`id` is always included)
    async fn list_all(
        &self,
        collection: Collection,
        fields: &[&str],
    ) -> Result<Vec<Record>, StoreError>;

    /// First record whose `field` equals `value` exactly
    async fn find_first(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, StoreError>;

    async fn create(&self, collection: Collection, payload: Value) -> Result<Record, StoreError>;

    /// Merge `payload` into an existing record
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        payload: Value,
    ) -> Result<Record, StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;
}

/// Keep only the requested fields of a record (plus its id)
pub(crate) fn project(record: Record, fields: &[&str]) -> Record {
    if fields.is_empty() {
        return record;
    }
    let fields = record
        .fields
        .into_iter()
        .filter(|(name, _)| fields.contains(&name.as_str()))
        .collect();
    Record {
        id: record.id,
        fields,
    }
}
