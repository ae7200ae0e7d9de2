use serde::{Deserialize, Serialize};

/// An authenticated user session as reported by the auth provider.
///
/// The synchronizer only reads `user_id`; `email` is carried for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: String,
    pub email: String,
}
