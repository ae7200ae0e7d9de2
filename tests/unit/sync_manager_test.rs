//! Unit tests for the bookmark synchronizer.
//!
//! Exercises the full operation surface against the in-memory store:
//! owner-scoped loading, both reconciliation policies, failure recovery,
//! push-driven reloads, and the stale-response guard.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use marksync::managers::sync_manager::{ReconcilePolicy, SyncManager, SyncManagerTrait};
use marksync::store::memory::MemoryStore;
use marksync::store::RemoteStore;
use marksync::types::bookmark::{Bookmark, NewBookmark};
use marksync::types::errors::SyncError;

fn seeded(id: &str, owner: &str, created_at: i64) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        title: format!("title-{}", id),
        url: format!("https://example.com/{}", id),
        owner_id: owner.to_string(),
        created_at,
    }
}

fn is_newest_first(items: &[Bookmark]) -> bool {
    items.windows(2).all(|w| w[0].created_at >= w[1].created_at)
}

/// Polls `condition` until it holds or the timeout elapses.
async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// === initialize ===

#[tokio::test]
async fn initialize_loads_owner_scoped_newest_first() {
    let store = Arc::new(MemoryStore::new());
    store.seed(seeded("a", "u1", 1));
    store.seed(seeded("b", "u1", 2));
    store.seed(seeded("x", "u2", 3));

    let manager = SyncManager::new(store, ReconcilePolicy::Optimistic);
    manager.initialize("u1").await.unwrap();

    let items = manager.items();
    assert_eq!(
        items.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
        vec!["b", "a"]
    );
    assert!(items.iter().all(|b| b.owner_id == "u1"));
}

#[tokio::test]
async fn initialize_failure_leaves_items_empty_and_is_retryable() {
    let store = Arc::new(MemoryStore::new());
    store.seed(seeded("a", "u1", 1));
    store.fail_next_list();

    let manager = SyncManager::new(store, ReconcilePolicy::Optimistic);
    let err = manager.initialize("u1").await.unwrap_err();
    assert!(matches!(err, SyncError::LoadFailed(_)));
    assert!(manager.items().is_empty());

    // Retry succeeds.
    manager.initialize("u1").await.unwrap();
    assert_eq!(manager.items().len(), 1);
}

#[tokio::test]
async fn initialize_with_new_user_replaces_collection() {
    let store = Arc::new(MemoryStore::new());
    store.seed(seeded("a", "u1", 1));
    store.seed(seeded("x", "u2", 2));

    let manager = SyncManager::new(store, ReconcilePolicy::Optimistic);
    manager.initialize("u1").await.unwrap();
    manager.initialize("u2").await.unwrap();

    let items = manager.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "x");
}

// === add ===

#[tokio::test]
async fn add_puts_newest_on_top() {
    let store = Arc::new(MemoryStore::new());
    let manager = SyncManager::new(store, ReconcilePolicy::Optimistic);
    manager.initialize("u1").await.unwrap();

    manager.add("Older", "https://old.example.com").await.unwrap();
    manager.add("Example", "https://example.com").await.unwrap();

    let items = manager.items();
    assert_eq!(items[0].title, "Example");
    assert!(is_newest_first(&items));
}

#[rstest]
#[case::optimistic(ReconcilePolicy::Optimistic)]
#[case::refetch(ReconcilePolicy::RefetchAfterWrite)]
#[tokio::test]
async fn add_matches_fresh_load(#[case] policy: ReconcilePolicy) {
    let store = Arc::new(MemoryStore::new());
    let manager = SyncManager::new(store.clone(), policy);
    manager.initialize("u1").await.unwrap();

    manager.add("One", "https://one.example.com").await.unwrap();
    manager.add("Two", "https://two.example.com").await.unwrap();

    assert_eq!(manager.items(), store.list_bookmarks("u1").await.unwrap());
}

#[rstest]
#[case::title("", "https://example.com", "title")]
#[case::url("Example", "", "url")]
#[tokio::test]
async fn add_rejects_empty_fields(
    #[case] title: &str,
    #[case] url: &str,
    #[case] field: &'static str,
) {
    let store = Arc::new(MemoryStore::new());
    let manager = SyncManager::new(store.clone(), ReconcilePolicy::Optimistic);
    manager.initialize("u1").await.unwrap();

    let err = manager.add(title, url).await.unwrap_err();
    assert_eq!(err, SyncError::EmptyField(field));

    // Nothing was submitted to the store.
    assert!(store.list_bookmarks("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn add_without_initialize_is_no_session() {
    let store = Arc::new(MemoryStore::new());
    let manager = SyncManager::new(store, ReconcilePolicy::Optimistic);

    let err = manager.add("Example", "https://example.com").await.unwrap_err();
    assert_eq!(err, SyncError::NoSession);
}

#[tokio::test]
async fn add_remote_failure_leaves_items_untouched() {
    let store = Arc::new(MemoryStore::new());
    store.seed(seeded("a", "u1", 1));

    let manager = SyncManager::new(store.clone(), ReconcilePolicy::Optimistic);
    manager.initialize("u1").await.unwrap();

    store.fail_next_insert();
    let err = manager.add("Doomed", "https://example.com").await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::WriteFailed {
            operation: "add",
            ..
        }
    ));

    let items = manager.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "a");
}

#[tokio::test]
async fn refetch_add_picks_up_concurrent_changes() {
    let store = Arc::new(MemoryStore::new());
    let manager = SyncManager::new(store.clone(), ReconcilePolicy::RefetchAfterWrite);
    manager.initialize("u1").await.unwrap();

    // Another session writes behind this manager's back.
    store
        .insert_bookmark(NewBookmark {
            title: "Concurrent".to_string(),
            url: "https://elsewhere.example.com".to_string(),
            owner_id: "u1".to_string(),
        })
        .await
        .unwrap();

    manager.add("Mine", "https://example.com").await.unwrap();

    let titles: Vec<_> = manager.items().iter().map(|b| b.title.clone()).collect();
    assert!(titles.contains(&"Concurrent".to_string()));
    assert!(titles.contains(&"Mine".to_string()));
}

// === delete ===

#[rstest]
#[case::optimistic(ReconcilePolicy::Optimistic)]
#[case::refetch(ReconcilePolicy::RefetchAfterWrite)]
#[tokio::test]
async fn delete_removes_locally_and_remotely(#[case] policy: ReconcilePolicy) {
    let store = Arc::new(MemoryStore::new());
    store.seed(seeded("a", "u1", 1));
    store.seed(seeded("b", "u1", 2));

    let manager = SyncManager::new(store.clone(), policy);
    manager.initialize("u1").await.unwrap();

    manager.delete("a").await.unwrap();

    assert!(manager.items().iter().all(|b| b.id != "a"));
    assert!(store
        .list_bookmarks("u1")
        .await
        .unwrap()
        .iter()
        .all(|b| b.id != "a"));
}

#[tokio::test]
async fn optimistic_delete_failure_restores_via_reload() {
    let store = Arc::new(MemoryStore::new());
    store.seed(seeded("a", "u1", 1));

    let manager = SyncManager::new(store.clone(), ReconcilePolicy::Optimistic);
    manager.initialize("u1").await.unwrap();

    store.fail_next_delete();
    let err = manager.delete("a").await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::WriteFailed {
            operation: "delete",
            ..
        }
    ));

    // The recovery reload brought the record back.
    let items = manager.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "a");
}

#[rstest]
#[case::optimistic(ReconcilePolicy::Optimistic)]
#[case::refetch(ReconcilePolicy::RefetchAfterWrite)]
#[tokio::test]
async fn delete_unknown_id_surfaces_failure_without_corruption(#[case] policy: ReconcilePolicy) {
    let store = Arc::new(MemoryStore::new());
    store.seed(seeded("a", "u1", 1));

    let manager = SyncManager::new(store, policy);
    manager.initialize("u1").await.unwrap();

    let err = manager.delete("missing").await.unwrap_err();
    assert!(matches!(err, SyncError::WriteFailed { .. }));

    let items = manager.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "a");
}

#[tokio::test]
async fn delete_without_initialize_is_no_session() {
    let store = Arc::new(MemoryStore::new());
    let manager = SyncManager::new(store, ReconcilePolicy::Optimistic);
    assert_eq!(manager.delete("a").await.unwrap_err(), SyncError::NoSession);
}

// === subscription ===

#[tokio::test]
async fn push_reload_converges_watcher_with_writer() {
    let store = Arc::new(MemoryStore::new());

    let watcher = SyncManager::new(store.clone(), ReconcilePolicy::Optimistic);
    watcher.initialize("u1").await.unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    let _subscription = watcher
        .subscribe_changes(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    let writer = SyncManager::new(store, ReconcilePolicy::Optimistic);
    writer.initialize("u1").await.unwrap();
    writer.add("Elsewhere", "https://example.com").await.unwrap();

    assert!(
        wait_until(|| watcher.items().len() == 1).await,
        "watcher never picked up the remote add"
    );
    assert_eq!(watcher.items()[0].title, "Elsewhere");
    assert!(notified.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn foreign_owner_push_causes_no_visible_change() {
    let store = Arc::new(MemoryStore::new());
    store.seed(seeded("a", "u1", 1));

    let manager = SyncManager::new(store.clone(), ReconcilePolicy::Optimistic);
    manager.initialize("u1").await.unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    let _subscription = manager
        .subscribe_changes(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    store
        .insert_bookmark(NewBookmark {
            title: "Not yours".to_string(),
            url: "https://example.com".to_string(),
            owner_id: "u2".to_string(),
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let items = manager.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "a");
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn subscription_stops_applying_after_reset() {
    let store = Arc::new(MemoryStore::new());

    let manager = SyncManager::new(store.clone(), ReconcilePolicy::Optimistic);
    manager.initialize("u1").await.unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    let _subscription = manager
        .subscribe_changes(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    // Session ends; anything the subscription delivers afterwards is stale.
    manager.reset();

    store
        .insert_bookmark(NewBookmark {
            title: "Late".to_string(),
            url: "https://example.com".to_string(),
            owner_id: "u1".to_string(),
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(manager.items().is_empty());
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn subscribe_without_initialize_is_no_session() {
    let store = Arc::new(MemoryStore::new());
    let manager = SyncManager::new(store, ReconcilePolicy::Optimistic);
    let err = manager.subscribe_changes(|_| {}).await.unwrap_err();
    assert_eq!(err, SyncError::NoSession);
}

// === eventual consistency ===

#[rstest]
#[case::optimistic(ReconcilePolicy::Optimistic)]
#[case::refetch(ReconcilePolicy::RefetchAfterWrite)]
#[tokio::test]
async fn succeeding_operations_match_fresh_initialize(#[case] policy: ReconcilePolicy) {
    let store = Arc::new(MemoryStore::new());
    let manager = SyncManager::new(store.clone(), policy);
    manager.initialize("u1").await.unwrap();

    let one = manager.add("One", "https://one.example.com").await.unwrap();
    manager.add("Two", "https://two.example.com").await.unwrap();
    manager.add("Three", "https://three.example.com").await.unwrap();
    manager.delete(&one.id).await.unwrap();

    let fresh = SyncManager::new(store, policy);
    fresh.initialize("u1").await.unwrap();

    assert_eq!(manager.items(), fresh.items());
    assert!(is_newest_first(&manager.items()));
}
