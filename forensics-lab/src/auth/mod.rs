//! Lab sign-in
//!
//! Credential verification is pluggable through `Authenticator`. The bundled
//! `DemoDirectory` holds the two training accounts; deployments can supply a
//! directory-backed implementation instead.

use serde::{Deserialize, Serialize};

pub mod demo;
pub mod session;

pub use demo::DemoDirectory;
pub use session::{SessionStore, SESSION_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Instructor => write!(f, "instructor"),
        }
    }
}

/// A signed-in user. Never carries a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Session storage failed: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Verifies credentials and returns the matching user.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError>;
}
