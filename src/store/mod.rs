//! Remote store contract for bookmark persistence.
//!
//! The synchronizer never talks to a backend directly; it goes through
//! [`RemoteStore`], which any backend (in-memory, HTTP, ...) implements.
//! Implementations own ID and timestamp assignment.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::errors::StoreError;

pub mod memory;
#[cfg(feature = "rest")]
pub mod rest;

/// The kind of change reported by a push subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
    /// The store cannot attribute the change to a single record
    /// (e.g. a polling backend noticed the collection differs).
    Refreshed,
}

/// A change notification for one owner's bookmarks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub owner_id: String,
    /// Affected record, when the store can name one.
    pub bookmark_id: Option<String>,
}

/// Receiving half of a push subscription, filtered to one owner.
///
/// Dropping the stream tears the subscription down; any producer task the
/// store spawned is aborted.
pub struct ChangeStream {
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    producer: Option<JoinHandle<()>>,
}

impl ChangeStream {
    pub fn new(rx: mpsc::UnboundedReceiver<ChangeEvent>, producer: Option<JoinHandle<()>>) -> Self {
        Self { rx, producer }
    }

    /// Waits for the next change event. Returns `None` once the producer
    /// side has gone away (store dropped or channel closed).
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
    }
}

/// Trait defining the remote bookmark store operations.
///
/// Deletion is always scoped by owner: a record can only be removed by the
/// user that created it.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns all bookmarks owned by `owner_id`, newest first.
    async fn list_bookmarks(&self, owner_id: &str) -> Result<Vec<Bookmark>, StoreError>;

    /// Inserts a bookmark and returns the persisted record with
    /// store-assigned `id` and `created_at`.
    async fn insert_bookmark(&self, new: NewBookmark) -> Result<Bookmark, StoreError>;

    /// Deletes the bookmark with the given ID, if owned by `owner_id`.
    async fn delete_bookmark(&self, owner_id: &str, bookmark_id: &str) -> Result<(), StoreError>;

    /// Opens a push channel delivering changes to `owner_id`'s bookmarks.
    async fn subscribe(&self, owner_id: &str) -> Result<ChangeStream, StoreError>;
}
