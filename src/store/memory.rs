// In-memory store used by tests: counts operations and can inject failures

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::{project, MediaStore, StoreError};
use crate::models::{Collection, Record};

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Vec<Record>>>,
    next_id: AtomicUsize,
    reads: AtomicUsize,
    creates: AtomicUsize,
    deletes: AtomicUsize,
    failing_keys: Mutex<HashSet<String>>,
    failing_lists: Mutex<HashSet<Collection>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing counters
    pub fn seed(&self, collection: Collection, payload: Value) -> String {
        let record = self.build_record(payload);
        let id = record.id.clone();
        self.collections
            .lock()
            .unwrap()
            .entry(collection)
            .or_default()
            .push(record);
        id
    }

    /// Current values of the key field in a collection, sorted
    pub fn keys(&self, collection: Collection) -> Vec<String> {
        let mut keys: Vec<String> = self
            .records(collection)
            .iter()
            .filter_map(|r| r.get_str(collection.key_field()).map(str::to_string))
            .collect();
        keys.sort();
        keys
    }

    pub fn records(&self, collection: Collection) -> Vec<Record> {
        self.collections
            .lock()
            .unwrap()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Make creates and deletes fail for records with this key
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    /// Make listing a collection fail
    pub fn fail_list(&self, collection: Collection) {
        self.failing_lists.lock().unwrap().insert(collection);
    }

    /// Block the next `list_all` call until the returned handle is notified
    pub fn pause_next_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn total_ops(&self) -> usize {
        self.reads() + self.creates() + self.deletes()
    }

    fn build_record(&self, payload: Value) -> Record {
        let id = format!("rec{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let fields = match payload {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        Record { id, fields }
    }

    fn is_failing(&self, collection: Collection, record: &Record) -> bool {
        record
            .get_str(collection.key_field())
            .map(|key| self.failing_keys.lock().unwrap().contains(key))
            .unwrap_or(false)
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn list_all(
        &self,
        collection: Collection,
        fields: &[&str],
    ) -> Result<Vec<Record>, StoreError> {
        let gate = self.list_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_lists.lock().unwrap().contains(&collection) {
            return Err(StoreError::Status {
                status: 500,
                body: "list failed".to_string(),
            });
        }

        Ok(self
            .records(collection)
            .into_iter()
            .map(|r| project(r, fields))
            .collect())
    }

    async fn find_first(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records(collection)
            .into_iter()
            .find(|r| r.get_str(field) == Some(value)))
    }

    async fn create(&self, collection: Collection, payload: Value) -> Result<Record, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let record = self.build_record(payload);
        if self.is_failing(collection, &record) {
            return Err(StoreError::Status {
                status: 400,
                body: "create failed".to_string(),
            });
        }
        self.collections
            .lock()
            .unwrap()
            .entry(collection)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        payload: Value,
    ) -> Result<Record, StoreError> {
        let mut collections = self.collections.lock().unwrap();
        let record = collections
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or(StoreError::NotFound)?;
        if let Value::Object(map) = payload {
            record.fields.extend(map);
        }
        Ok(record.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.collections.lock().unwrap();
        let records = collections.entry(collection).or_default();
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;
        if self.is_failing(collection, &records[index]) {
            return Err(StoreError::Status {
                status: 400,
                body: "delete failed".to_string(),
            });
        }
        records.remove(index);
        Ok(())
    }
}
