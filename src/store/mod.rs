//! Record store adapter: the only code that talks to the document collection.
//!
//! A [`RecordStore`] exposes three primitives over the `employees`
//! collection: a live [`Subscription`] delivering full snapshots, `create`, and
//! a merging `update`. There is no delete primitive; removal is a
//! soft delete expressed as an update.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use derive_more::{Display, Error};
use futures::Stream;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::model::{EmployeeId, EmployeePatch, EmployeeRecord};

pub mod memory;
pub mod mysql;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum StoreError {
    #[display(fmt = "transport error: {}", _0)]
    Transport(#[error(not(source))] String),
    #[display(fmt = "document {} not found", _0)]
    NotFound(#[error(not(source))] EmployeeId),
    #[display(fmt = "serialization error: {}", _0)]
    Serialization(#[error(not(source))] String),
    #[display(fmt = "invalid collection name: {}", _0)]
    InvalidCollection(#[error(not(source))] String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// One stored document: its id and its raw JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: EmployeeId,
    pub data: Map<String, Value>,
}

/// Complete point-in-time copy of the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    Snapshot(Snapshot),
    /// The listener failed and will deliver nothing further.
    Error(StoreError),
}

pub(crate) type SnapshotSender = mpsc::UnboundedSender<SnapshotEvent>;

type Teardown = Box<dyn FnOnce() + Send>;

/// Live listener on the collection.
///
/// The listener is released exactly once: by [`Subscription::unsubscribe`],
/// or when the subscription is dropped.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SnapshotEvent>,
    teardown: Option<Teardown>,
}

impl Subscription {
    pub(crate) fn channel(teardown: impl FnOnce() + Send + 'static) -> (SnapshotSender, Self) {
        let (sender, events) = mpsc::unbounded_channel();
        let subscription = Self {
            events,
            teardown: Some(Box::new(teardown)),
        };
        (sender, subscription)
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
        self.events.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl Stream for Subscription {
    type Item = SnapshotEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Register a live listener on the whole collection. The first event is
    /// the current snapshot; later ones follow every change.
    fn subscribe(&self) -> Subscription;

    /// Append a new document and return the id the store assigned.
    async fn create(&self, record: &EmployeeRecord) -> Result<EmployeeId, StoreError>;

    /// Merge `patch` into the document at `id`. Unknown ids fail with
    /// [`StoreError::NotFound`].
    async fn update(&self, id: &EmployeeId, patch: &EmployeePatch) -> Result<(), StoreError>;
}
