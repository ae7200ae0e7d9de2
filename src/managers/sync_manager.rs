//! Bookmark list synchronizer.
//!
//! Owns the in-memory, newest-first collection of the signed-in user's
//! bookmarks, applies mutations against an injected [`RemoteStore`], and
//! reconciles local state with the remote source of truth. The
//! reconciliation strategy is a [`ReconcilePolicy`] fixed at construction
//! and applied uniformly to adds and deletes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::store::RemoteStore;
use crate::types::bookmark::{sort_newest_first, Bookmark, NewBookmark};
use crate::types::errors::SyncError;

/// How local state is brought back in line with the remote store after a
/// write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// Apply the local mutation as soon as the remote store acknowledges
    /// (for deletes: before it acknowledges). Lowest perceived latency;
    /// concurrent changes from other sessions surface only on the next
    /// full load or push event.
    Optimistic,
    /// Re-run the full load after every acknowledged write. Picks up
    /// concurrent changes at the cost of an extra round trip.
    RefetchAfterWrite,
}

/// Trait defining the synchronizer operations exposed to a presentation
/// layer.
#[async_trait]
pub trait SyncManagerTrait {
    async fn initialize(&self, user_id: &str) -> Result<(), SyncError>;
    async fn add(&self, title: &str, url: &str) -> Result<Bookmark, SyncError>;
    async fn delete(&self, bookmark_id: &str) -> Result<(), SyncError>;
    fn items(&self) -> Vec<Bookmark>;
    fn current_user(&self) -> Option<String>;
    fn reset(&self);
}

struct State {
    items: Vec<Bookmark>,
    user_id: Option<String>,
    /// Bumped on every `initialize`/`reset`. A response whose captured
    /// epoch no longer matches was issued for a stale session and must not
    /// touch `items`.
    epoch: u64,
}

/// Handle to a running change subscription. Dropping it (or calling
/// [`ChangeSubscription::cancel`]) stops the background task.
#[derive(Debug)]
pub struct ChangeSubscription {
    task: JoinHandle<()>,
}

impl ChangeSubscription {
    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Bookmark list synchronizer over an injected remote store.
pub struct SyncManager {
    store: Arc<dyn RemoteStore>,
    state: Arc<Mutex<State>>,
    policy: ReconcilePolicy,
}

impl SyncManager {
    pub fn new(store: Arc<dyn RemoteStore>, policy: ReconcilePolicy) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(State {
                items: Vec::new(),
                user_id: None,
                epoch: 0,
            })),
            policy,
        }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Current user and epoch, or `NoSession` if `initialize` has not run.
    fn session_snapshot(&self) -> Result<(String, u64), SyncError> {
        let state = self.state.lock().unwrap();
        match &state.user_id {
            Some(user) => Ok((user.clone(), state.epoch)),
            None => Err(SyncError::NoSession),
        }
    }

    /// Full load from the store, applied only if the epoch is unchanged.
    async fn reload(&self, user_id: &str, epoch: u64) -> Result<(), SyncError> {
        let mut fresh = self
            .store
            .list_bookmarks(user_id)
            .await
            .map_err(SyncError::from_load)?;
        sort_newest_first(&mut fresh);

        let mut state = self.state.lock().unwrap();
        if state.epoch != epoch {
            tracing::debug!("Discarding stale load for {}", user_id);
            return Ok(());
        }
        state.items = fresh;
        Ok(())
    }

    /// Starts a push subscription for the current user's bookmarks.
    ///
    /// Every change event triggers a full load; the reloaded collection
    /// unconditionally replaces local state (reload-wins) and `on_change`
    /// is invoked with the refreshed snapshot. The task stops when the
    /// session epoch moves on, the stream closes, or the handle is dropped.
    pub async fn subscribe_changes<F>(&self, on_change: F) -> Result<ChangeSubscription, SyncError>
    where
        F: Fn(&[Bookmark]) + Send + 'static,
    {
        let (user_id, epoch) = self.session_snapshot()?;
        let mut stream = self
            .store
            .subscribe(&user_id)
            .await
            .map_err(|e| SyncError::SubscriptionLost(e.to_string()))?;

        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                // The store already filters; a mismatch here means a
                // misbehaving implementation, not a visible change.
                if event.owner_id != user_id {
                    continue;
                }

                let mut fresh = match store.list_bookmarks(&user_id).await {
                    Ok(list) => list,
                    Err(e) => {
                        tracing::warn!("Reload after change event failed for {}: {}", user_id, e);
                        continue;
                    }
                };
                sort_newest_first(&mut fresh);

                {
                    let mut state = state.lock().unwrap();
                    if state.epoch != epoch {
                        tracing::debug!("Session moved on; stopping subscription for {}", user_id);
                        return;
                    }
                    state.items = fresh.clone();
                }
                on_change(&fresh);
            }
            tracing::warn!("Change stream closed for {}", user_id);
        });

        Ok(ChangeSubscription { task })
    }
}

#[async_trait]
impl SyncManagerTrait for SyncManager {
    /// Sets the current user and replaces the collection with a full load.
    ///
    /// On failure the collection is left empty and the error is retryable.
    async fn initialize(&self, user_id: &str) -> Result<(), SyncError> {
        let epoch = {
            let mut state = self.state.lock().unwrap();
            state.user_id = Some(user_id.to_string());
            state.items.clear();
            state.epoch += 1;
            state.epoch
        };
        self.reload(user_id, epoch).await
    }

    /// Submits a new bookmark and reconciles per the configured policy.
    async fn add(&self, title: &str, url: &str) -> Result<Bookmark, SyncError> {
        if title.is_empty() {
            return Err(SyncError::EmptyField("title"));
        }
        if url.is_empty() {
            return Err(SyncError::EmptyField("url"));
        }
        let (user_id, epoch) = self.session_snapshot()?;

        let record = self
            .store
            .insert_bookmark(NewBookmark {
                title: title.to_string(),
                url: url.to_string(),
                owner_id: user_id.clone(),
            })
            .await
            .map_err(|e| SyncError::from_write("add", e))?;

        match self.policy {
            ReconcilePolicy::Optimistic => {
                let mut state = self.state.lock().unwrap();
                if state.epoch != epoch {
                    tracing::debug!("Discarding stale add result for {}", user_id);
                    return Ok(record);
                }
                // A push-triggered reload may have landed the record already.
                if !state.items.iter().any(|b| b.id == record.id) {
                    state.items.push(record.clone());
                    sort_newest_first(&mut state.items);
                }
            }
            ReconcilePolicy::RefetchAfterWrite => {
                self.reload(&user_id, epoch).await?;
            }
        }
        Ok(record)
    }

    /// Deletes a bookmark owned by the current user.
    ///
    /// Under the optimistic policy the record is removed locally before the
    /// remote call; if the remote delete then fails, recovery is a full
    /// load (a local re-insert could not know whether the delete partially
    /// applied), after which the write failure is still surfaced.
    async fn delete(&self, bookmark_id: &str) -> Result<(), SyncError> {
        let (user_id, epoch) = self.session_snapshot()?;

        match self.policy {
            ReconcilePolicy::Optimistic => {
                {
                    let mut state = self.state.lock().unwrap();
                    state.items.retain(|b| b.id != bookmark_id);
                }
                if let Err(e) = self.store.delete_bookmark(&user_id, bookmark_id).await {
                    if let Err(reload_err) = self.reload(&user_id, epoch).await {
                        tracing::warn!(
                            "Recovery reload after failed delete of {} failed: {}",
                            bookmark_id,
                            reload_err
                        );
                    }
                    return Err(SyncError::from_write("delete", e));
                }
                Ok(())
            }
            ReconcilePolicy::RefetchAfterWrite => {
                self.store
                    .delete_bookmark(&user_id, bookmark_id)
                    .await
                    .map_err(|e| SyncError::from_write("delete", e))?;
                self.reload(&user_id, epoch).await
            }
        }
    }

    /// Snapshot of the collection, newest first.
    fn items(&self) -> Vec<Bookmark> {
        self.state.lock().unwrap().items.clone()
    }

    fn current_user(&self) -> Option<String> {
        self.state.lock().unwrap().user_id.clone()
    }

    /// Clears the session and collection. Pending responses issued before
    /// the reset are discarded when they land.
    fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.user_id = None;
        state.items.clear();
        state.epoch += 1;
    }
}
