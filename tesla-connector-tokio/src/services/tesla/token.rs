//! Refresh token kept on disk between restarts.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The most recent refresh token issued by the auth server.
///
/// Tesla rotates the refresh token on every renewal, so the latest one needs to
/// survive a restart.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// The refresh token.
    pub refresh_token: String,

    /// When the token was issued.
    pub updated_at: DateTime<Utc>,
}

impl StoredToken {
    /// Create a stored token issued now.
    #[must_use]
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            updated_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("refresh_token", &"[censored]")
            .field("updated_at", &self.updated_at)
            .finish()
    }
}
