// Presence reconciliation between the on-disk inventory and a remote collection

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::{Collection, RemoteRecord};
use crate::store::{MediaStore, StoreError};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub on_disk: usize,
    pub in_store: usize,
    pub created: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl ReconcileStats {
    pub fn mutations(&self) -> usize {
        self.created + self.deleted
    }
}

/// Fetch the key projection of every record in a collection
async fn remote_inventory(
    store: &dyn MediaStore,
    collection: Collection,
) -> Result<HashMap<String, RemoteRecord>, StoreError> {
    let key_field = collection.key_field();
    let records = store.list_all(collection, &[key_field]).await?;

    let mut inventory = HashMap::with_capacity(records.len());
    for record in records {
        let id = record.id.clone();
        match RemoteRecord::from_record(record, key_field) {
            Some(remote) => {
                inventory.insert(remote.key.clone(), remote);
            }
            None => tracing::debug!(
                "[{}] Ignoring record {} without {}",
                collection.label(),
                id,
                key_field
            ),
        }
    }
    Ok(inventory)
}

/// Converge a remote collection onto the disk inventory.
///
/// Keys only on disk are created with their full payload, keys only in the
/// store are deleted, and keys present in both are left untouched. A failed
/// create or delete is logged and counted; the next scan retries it.
pub async fn reconcile<T: Serialize>(
    store: &dyn MediaStore,
    collection: Collection,
    on_disk: &BTreeMap<String, T>,
) -> Result<ReconcileStats, StoreError> {
    let label = collection.label();
    tracing::info!("--- Syncing {} ---", collection.name().to_uppercase());

    let in_store = remote_inventory(store, collection).await?;
    tracing::info!("Found {} {} records in DB.", in_store.len(), label);

    let mut stats = ReconcileStats {
        on_disk: on_disk.len(),
        in_store: in_store.len(),
        ..Default::default()
    };

    for (key, entry) in on_disk {
        if in_store.contains_key(key) {
            stats.unchanged += 1;
            continue;
        }

        tracing::info!("[{}] CREATING: {}", label, key);
        let created = match serde_json::to_value(entry) {
            Ok(payload) => store.create(collection, payload).await.map(|_| ()),
            Err(e) => Err(StoreError::from(e)),
        };
        match created {
            Ok(()) => stats.created += 1,
            Err(e) => {
                tracing::error!("[{}] FAILED to create {}: {}", label, key, e);
                stats.failed += 1;
            }
        }
    }

    let mut orphaned: Vec<&RemoteRecord> = in_store
        .values()
        .filter(|remote| !on_disk.contains_key(&remote.key))
        .collect();
    orphaned.sort_by(|a, b| a.key.cmp(&b.key));

    for remote in orphaned {
        tracing::info!(
            "[{}] DELETING: {} (Record ID: {})",
            label,
            remote.key,
            remote.id
        );
        match store.delete(collection, &remote.id).await {
            Ok(()) => stats.deleted += 1,
            Err(e) => {
                tracing::error!("[{}] FAILED to delete {}: {}", label, remote.key, e);
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}
