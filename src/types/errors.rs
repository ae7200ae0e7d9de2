use std::fmt;

// === StoreError ===

/// Errors reported by a remote store implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The remote store could not be reached (transport failure).
    Unreachable(String),
    /// The remote store rejected the operation (constraint violation, bad request).
    Rejected(String),
    /// No record with the given ID exists for the requesting owner.
    NotFound(String),
    /// The caller is not permitted to perform the operation.
    PermissionDenied(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unreachable(msg) => write!(f, "Remote store unreachable: {}", msg),
            StoreError::Rejected(msg) => write!(f, "Remote store rejected operation: {}", msg),
            StoreError::NotFound(id) => write!(f, "Bookmark not found: {}", id),
            StoreError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// === SyncError ===

/// Errors surfaced by the bookmark synchronizer.
///
/// All variants are non-fatal: the worst case is a stale or empty list,
/// recoverable by retrying the triggering operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No user session is active; `initialize` has not been called.
    NoSession,
    /// A required field was empty. Carries the field name.
    EmptyField(&'static str),
    /// The full load from the remote store failed.
    LoadFailed(String),
    /// An insert or delete was rejected or unreachable. Carries the
    /// operation name and failure detail for user-facing reporting.
    WriteFailed {
        operation: &'static str,
        detail: String,
    },
    /// The remote store denied the operation for the current user.
    PermissionDenied(String),
    /// The push subscription could not be established or was dropped.
    SubscriptionLost(String),
}

impl SyncError {
    /// Maps a store-level failure into the synchronizer taxonomy for a
    /// write operation, preserving permission failures as their own class.
    pub fn from_write(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(msg) => SyncError::PermissionDenied(msg),
            other => SyncError::WriteFailed {
                operation,
                detail: other.to_string(),
            },
        }
    }

    /// Maps a store-level failure during a full load.
    pub fn from_load(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(msg) => SyncError::PermissionDenied(msg),
            other => SyncError::LoadFailed(other.to_string()),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::NoSession => write!(f, "No active user session"),
            SyncError::EmptyField(field) => write!(f, "Field must not be empty: {}", field),
            SyncError::LoadFailed(msg) => write!(f, "Failed to load bookmarks: {}", msg),
            SyncError::WriteFailed { operation, detail } => {
                write!(f, "Failed to {} bookmark: {}", operation, detail)
            }
            SyncError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            SyncError::SubscriptionLost(msg) => write!(f, "Subscription lost: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {}
