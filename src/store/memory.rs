use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Document, RecordStore, Snapshot, SnapshotEvent, SnapshotSender, StoreError, Subscription};
use crate::model::{EmployeeId, EmployeePatch, EmployeeRecord};

/// In-process document collection with live listeners.
///
/// Every successful write pushes a fresh snapshot to all listeners. Writes can
/// be made to fail on demand, and listeners can be broken, to exercise the
/// transport-error paths without a network.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    documents: Vec<Document>,
    listeners: HashMap<u64, SnapshotSender>,
    next_listener: u64,
    write_failures: VecDeque<StoreError>,
    create_calls: usize,
    update_calls: usize,
    last_update: Option<(EmployeeId, Map<String, Value>)>,
}

impl Inner {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            documents: self.documents.clone(),
        }
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.listeners
            .retain(|_, listener| listener.send(SnapshotEvent::Snapshot(snapshot.clone())).is_ok());
        debug!(
            documents = snapshot.documents.len(),
            listeners = self.listeners.len(),
            "Published snapshot"
        );
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn release_listener(inner: &Weak<Mutex<Inner>>, key: u64) {
    if let Some(inner) = inner.upgrade() {
        lock(&inner).listeners.remove(&key);
        debug!(listener = key, "Listener released");
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw document body as-is, bypassing the typed write path.
    pub fn insert_document(&self, data: Value) -> EmployeeId {
        let data = match data {
            Value::Object(fields) => fields,
            other => {
                let mut fields = Map::new();
                fields.insert("value".to_string(), other);
                fields
            }
        };
        let id = EmployeeId::new(Uuid::new_v4().to_string());
        let mut inner = lock(&self.inner);
        inner.documents.push(Document {
            id: id.clone(),
            data,
        });
        inner.publish();
        id
    }

    pub fn document(&self, id: &EmployeeId) -> Option<Document> {
        lock(&self.inner)
            .documents
            .iter()
            .find(|doc| &doc.id == id)
            .cloned()
    }

    pub fn documents(&self) -> Vec<Document> {
        lock(&self.inner).documents.clone()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    /// Make the next write (create or update) fail with `err`.
    pub fn fail_next_write(&self, err: StoreError) {
        lock(&self.inner).write_failures.push_back(err);
    }

    /// Deliver `err` to every listener and drop them, as a lost connection would.
    pub fn break_subscriptions(&self, err: StoreError) {
        let mut inner = lock(&self.inner);
        for listener in inner.listeners.values() {
            let _ = listener.send(SnapshotEvent::Error(err.clone()));
        }
        inner.listeners.clear();
    }

    pub fn create_calls(&self) -> usize {
        lock(&self.inner).create_calls
    }

    pub fn update_calls(&self) -> usize {
        lock(&self.inner).update_calls
    }

    /// Target and fields of the most recent update call, failed or not.
    pub fn last_update(&self) -> Option<(EmployeeId, Map<String, Value>)> {
        lock(&self.inner).last_update.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn subscribe(&self) -> Subscription {
        let mut inner = lock(&self.inner);
        let key = inner.next_listener;
        inner.next_listener += 1;

        let weak = Arc::downgrade(&self.inner);
        let (sender, subscription) = Subscription::channel(move || release_listener(&weak, key));
        let _ = sender.send(SnapshotEvent::Snapshot(inner.snapshot()));
        inner.listeners.insert(key, sender);
        debug!(listener = key, "Listener registered");

        subscription
    }

    async fn create(&self, record: &EmployeeRecord) -> Result<EmployeeId, StoreError> {
        let data = match serde_json::to_value(record)? {
            Value::Object(fields) => fields,
            _ => {
                return Err(StoreError::Serialization(
                    "record did not serialize to an object".to_string(),
                ));
            }
        };

        let mut inner = lock(&self.inner);
        inner.create_calls += 1;
        if let Some(err) = inner.write_failures.pop_front() {
            return Err(err);
        }

        let id = EmployeeId::new(Uuid::new_v4().to_string());
        inner.documents.push(Document {
            id: id.clone(),
            data,
        });
        info!(employee_id = %id, "Document created");
        inner.publish();

        Ok(id)
    }

    async fn update(&self, id: &EmployeeId, patch: &EmployeePatch) -> Result<(), StoreError> {
        let fields = patch.to_fields()?;

        let mut inner = lock(&self.inner);
        inner.update_calls += 1;
        inner.last_update = Some((id.clone(), fields.clone()));
        if let Some(err) = inner.write_failures.pop_front() {
            return Err(err);
        }

        let document = inner
            .documents
            .iter_mut()
            .find(|doc| &doc.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        for (key, value) in fields {
            document.data.insert(key, value);
        }
        info!(employee_id = %id, "Document updated");
        inner.publish();

        Ok(())
    }
}
