//! In-memory [`RemoteStore`] implementation.
//!
//! Stands in for the real backend in tests and the console demo. Assigns
//! UUID ids and strictly increasing timestamps, and fans change events out
//! to subscribers over a broadcast channel with per-subscriber owner
//! filtering.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::store::{ChangeEvent, ChangeKind, ChangeStream, RemoteStore};
use crate::types::bookmark::{sort_newest_first, Bookmark, NewBookmark};
use crate::types::errors::StoreError;

const EVENT_CHANNEL_CAPACITY: usize = 64;

struct Inner {
    rows: Vec<Bookmark>,
    last_ts: i64,
    fail_next_list: bool,
    fail_next_insert: bool,
    fail_next_delete: bool,
}

/// In-memory bookmark store with push notifications.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                rows: Vec::new(),
                last_ts: 0,
                fail_next_list: false,
                fail_next_insert: false,
                fail_next_delete: false,
            }),
            events,
        }
    }

    /// Returns the current UNIX timestamp in seconds.
    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Plants a row verbatim, without assigning fields or emitting an event.
    /// Test fixture: lets callers choose ids and timestamps.
    pub fn seed(&self, bookmark: Bookmark) {
        let mut inner = self.inner.lock().unwrap();
        inner.last_ts = inner.last_ts.max(bookmark.created_at);
        inner.rows.push(bookmark);
    }

    /// Arms a one-shot failure for the next list.
    pub fn fail_next_list(&self) {
        self.inner.lock().unwrap().fail_next_list = true;
    }

    /// Arms a one-shot failure for the next insert.
    pub fn fail_next_insert(&self) {
        self.inner.lock().unwrap().fail_next_insert = true;
    }

    /// Arms a one-shot failure for the next delete.
    pub fn fail_next_delete(&self) {
        self.inner.lock().unwrap().fail_next_delete = true;
    }

    fn emit(&self, event: ChangeEvent) {
        // No subscribers is fine; the send error is not a failure.
        let _ = self.events.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_bookmarks(&self, owner_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_next_list {
            inner.fail_next_list = false;
            return Err(StoreError::Unreachable("injected list failure".to_string()));
        }
        let mut matching: Vec<Bookmark> = inner
            .rows
            .iter()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect();
        sort_newest_first(&mut matching);
        Ok(matching)
    }

    async fn insert_bookmark(&self, new: NewBookmark) -> Result<Bookmark, StoreError> {
        let bookmark = {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_next_insert {
                inner.fail_next_insert = false;
                return Err(StoreError::Unreachable("injected insert failure".to_string()));
            }

            // Strictly increasing stamps keep rapid inserts deterministically ordered.
            let ts = Self::now().max(inner.last_ts + 1);
            inner.last_ts = ts;

            let bookmark = Bookmark {
                id: Uuid::new_v4().to_string(),
                title: new.title,
                url: new.url,
                owner_id: new.owner_id,
                created_at: ts,
            };
            inner.rows.push(bookmark.clone());
            bookmark
        };

        self.emit(ChangeEvent {
            kind: ChangeKind::Inserted,
            owner_id: bookmark.owner_id.clone(),
            bookmark_id: Some(bookmark.id.clone()),
        });
        Ok(bookmark)
    }

    async fn delete_bookmark(&self, owner_id: &str, bookmark_id: &str) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_next_delete {
                inner.fail_next_delete = false;
                return Err(StoreError::Unreachable("injected delete failure".to_string()));
            }

            let before = inner.rows.len();
            inner
                .rows
                .retain(|b| !(b.id == bookmark_id && b.owner_id == owner_id));
            if inner.rows.len() == before {
                return Err(StoreError::NotFound(bookmark_id.to_string()));
            }
        }

        self.emit(ChangeEvent {
            kind: ChangeKind::Deleted,
            owner_id: owner_id.to_string(),
            bookmark_id: Some(bookmark_id.to_string()),
        });
        Ok(())
    }

    async fn subscribe(&self, owner_id: &str) -> Result<ChangeStream, StoreError> {
        let mut events = self.events.subscribe();
        let owner = owner_id.to_string();
        let (tx, rx) = mpsc::unbounded_channel();

        let producer = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if event.owner_id != owner {
                            continue;
                        }
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    // A lagged subscriber missed events; the consumer reloads
                    // on every event anyway, so skipping ahead is safe.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(ChangeStream::new(rx, Some(producer)))
    }
}
