use serde::{Deserialize, Serialize};

/// A saved bookmark as persisted by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    pub owner_id: String,
    pub created_at: i64,
}

/// A candidate bookmark submitted for insertion.
///
/// The remote store assigns `id` and `created_at` and returns the
/// persisted [`Bookmark`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub owner_id: String,
}

/// Sorts bookmarks newest-first: descending `created_at`, ties broken by
/// descending `id` so the order is deterministic.
pub fn sort_newest_first(items: &mut [Bookmark]) {
    items.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
