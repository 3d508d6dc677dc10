//! Single-admin session authorization.
//!
//! A client session is either [`SessionState::Anonymous`] or
//! [`SessionState::Authenticated`]. Only a successful [`SessionGuard::login`]
//! moves it to `Authenticated`; every mutating admin route calls
//! [`SessionGuard::require`] and treats anything else as denied.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::AdminConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthenticated,
}

/// Lowercase hex SHA-256 of `password`.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// Byte comparison whose running time does not depend on where inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password_hash: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl AdminCredentials {
    pub fn new(username: &str, password_hash: &str) -> Result<Self> {
        if username.is_empty() {
            bail!("admin username must not be empty");
        }
        let password_hash = password_hash.trim().to_ascii_lowercase();
        if password_hash.len() != 64 || !password_hash.chars().all(|c| c.is_ascii_hexdigit()) {
            bail!("admin password_hash must be a 64 character hex SHA-256 digest");
        }
        Ok(Self {
            username: username.to_string(),
            password_hash,
        })
    }

    pub fn from_config(config: &AdminConfig) -> Result<Self> {
        Self::new(&config.username, &config.password_hash)
    }

    fn matches(&self, username: &str, password: &str) -> bool {
        let username_ok = constant_time_eq(self.username.as_bytes(), username.as_bytes());
        let password_ok = constant_time_eq(
            self.password_hash.as_bytes(),
            hash_password(password).as_bytes(),
        );
        username_ok & password_ok
    }
}

#[derive(Debug)]
pub struct SessionGuard {
    credentials: AdminCredentials,
}

impl SessionGuard {
    pub fn new(credentials: AdminCredentials) -> Self {
        Self { credentials }
    }

    /// Authenticate `state` if the credentials match; otherwise leave it
    /// `Anonymous`.
    pub fn login(
        &self,
        state: &mut SessionState,
        username: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        if self.credentials.matches(username, password) {
            *state = SessionState::Authenticated;
            Ok(())
        } else {
            *state = SessionState::Anonymous;
            Err(AuthError::InvalidCredentials)
        }
    }

    pub fn logout(&self, state: &mut SessionState) {
        *state = SessionState::Anonymous;
    }

    pub fn require(&self, state: SessionState) -> Result<(), AuthError> {
        match state {
            SessionState::Authenticated => Ok(()),
            SessionState::Anonymous => Err(AuthError::Unauthenticated),
        }
    }
}
