//! marksync — console demo.
//!
//! Walks the synchronizer end to end against the in-memory store: sign-in,
//! initial load, optimistic add/delete, failure recovery, and push-driven
//! convergence between two sessions.

use std::sync::Arc;
use std::time::Duration;

use marksync::auth::{AuthProvider, StaticAuth};
use marksync::managers::sync_manager::{ReconcilePolicy, SyncManager, SyncManagerTrait};
use marksync::store::memory::MemoryStore;
use marksync::types::bookmark::Bookmark;

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║            marksync v{} — Demo Mode                       ║", env!("CARGO_PKG_VERSION"));
    println!("║     Bookmark list synchronizer, in-memory backend          ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let store = Arc::new(MemoryStore::new());
    let auth = StaticAuth::new();

    demo_sign_in_and_load(&auth, store.clone()).await;
    demo_failure_recovery(store.clone()).await;
    demo_push_convergence(store.clone()).await;

    auth.sign_out();
    println!();
    println!("  ✅ Demo complete. Signed out: {}", auth.current_session().is_none());
}

fn section(name: &str) {
    println!("───────────────────────────────────────────────────────────────");
    println!("  📦 {}", name);
    println!("───────────────────────────────────────────────────────────────");
}

fn print_items(label: &str, items: &[Bookmark]) {
    println!("  {} ({} bookmarks):", label, items.len());
    for b in items {
        println!("    [{}] {} — {}", b.created_at, b.title, b.url);
    }
}

async fn demo_sign_in_and_load(auth: &StaticAuth, store: Arc<MemoryStore>) {
    section("Sign-in, optimistic add, delete");

    auth.sign_in("demo-user", "demo@example.com");
    let session = auth.current_session().expect("just signed in");
    println!("  Signed in as {}", session.email);

    let manager = SyncManager::new(store, ReconcilePolicy::Optimistic);
    manager.initialize(&session.user_id).await.expect("initial load");

    manager
        .add("Rust Programming Language", "https://rust-lang.org")
        .await
        .expect("add");
    let example = manager
        .add("Example", "https://example.com")
        .await
        .expect("add");
    print_items("After two adds", &manager.items());

    manager.delete(&example.id).await.expect("delete");
    print_items("After delete", &manager.items());
}

async fn demo_failure_recovery(store: Arc<MemoryStore>) {
    section("Delete failure and recovery reload");

    let manager = SyncManager::new(store.clone(), ReconcilePolicy::Optimistic);
    manager.initialize("demo-user").await.expect("load");
    let victim = manager.items().first().expect("one bookmark left").clone();

    store.fail_next_delete();
    match manager.delete(&victim.id).await {
        Err(e) => println!("  Delete failed as injected: {}", e),
        Ok(()) => println!("  Unexpected success"),
    }
    let restored = manager.items().iter().any(|b| b.id == victim.id);
    println!("  Recovery reload restored '{}': {}", victim.title, restored);
}

async fn demo_push_convergence(store: Arc<MemoryStore>) {
    section("Two sessions, push-driven convergence");

    let watcher = SyncManager::new(store.clone(), ReconcilePolicy::Optimistic);
    watcher.initialize("demo-user").await.expect("load");
    let subscription = watcher
        .subscribe_changes(|items| {
            println!("  Push: collection refreshed to {} bookmarks", items.len());
        })
        .await
        .expect("subscribe");

    let other_session = SyncManager::new(store, ReconcilePolicy::RefetchAfterWrite);
    other_session.initialize("demo-user").await.expect("load");
    other_session
        .add("Added elsewhere", "https://docs.rs")
        .await
        .expect("add");

    // Give the push event time to propagate to the watcher.
    tokio::time::sleep(Duration::from_millis(200)).await;
    print_items("Watcher after remote add", &watcher.items());

    subscription.cancel();
}
