//! Persisted sign-in session

use anyhow::Context;
use std::sync::Arc;

use super::{AuthError, Authenticator, User};
use crate::storage::KeyValueStore;

/// Storage key holding the signed-in user
pub const SESSION_KEY: &str = "forensics_lab_user";

/// Signs users in through an `Authenticator` and remembers the result.
pub struct SessionStore {
    port: Arc<dyn KeyValueStore>,
    authenticator: Box<dyn Authenticator>,
}

impl SessionStore {
    pub fn new(port: Arc<dyn KeyValueStore>, authenticator: Box<dyn Authenticator>) -> Self {
        Self {
            port,
            authenticator,
        }
    }

    /// Verify credentials and persist the session.
    pub fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let user = self.authenticator.authenticate(email, password)?;
        let raw = serde_json::to_string(&user).context("Failed to serialize session")?;
        self.port
            .set(SESSION_KEY, &raw)
            .context("Failed to persist session")?;
        tracing::info!("Signed in {} ({})", user.email, user.role);
        Ok(user)
    }

    /// The previously signed-in user, if a readable session exists.
    pub fn restore(&self) -> Option<User> {
        let raw = match self.port.get(SESSION_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read session: {:#}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Ignoring malformed session: {}", e);
                None
            }
        }
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        self.port
            .remove(SESSION_KEY)
            .context("Failed to clear session")?;
        Ok(())
    }
}
