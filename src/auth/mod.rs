//! Authentication collaborator contract.
//!
//! The synchronizer never checks the session itself: the embedding layer
//! asks the provider for the current session and passes the user ID to
//! [`crate::managers::sync_manager::SyncManager::initialize`].

use std::sync::Mutex;

use crate::types::session::UserSession;

/// Trait defining the authentication operations the crate consumes.
pub trait AuthProvider: Send + Sync {
    /// Returns the active session, if a user is signed in.
    fn current_session(&self) -> Option<UserSession>;

    /// Ends the active session.
    fn sign_out(&self);
}

/// In-memory auth provider for tests and the console demo.
pub struct StaticAuth {
    session: Mutex<Option<UserSession>>,
}

impl StaticAuth {
    /// Creates a provider with no active session.
    pub fn new() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }

    /// Signs a user in, replacing any active session.
    pub fn sign_in(&self, user_id: &str, email: &str) {
        let mut session = self.session.lock().unwrap();
        *session = Some(UserSession {
            user_id: user_id.to_string(),
            email: email.to_string(),
        });
    }
}

impl Default for StaticAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for StaticAuth {
    fn current_session(&self) -> Option<UserSession> {
        self.session.lock().unwrap().clone()
    }

    fn sign_out(&self) {
        self.session.lock().unwrap().take();
    }
}
