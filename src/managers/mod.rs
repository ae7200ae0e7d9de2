// State managers.
// The sync manager owns the signed-in user's bookmark collection and its
// reconciliation against the remote store.

pub mod sync_manager;
