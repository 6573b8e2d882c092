//! Process-wide login state.
//!
//! The login is a local stub, not an authentication system: it records who
//! is operating the client so commands can be attributed.

use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::{CredentialStore, StoreError};

const GUEST: &str = "guest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str, SessionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SessionError::MissingField(field));
    }
    Ok(trimmed)
}

/// Current user plus its persistence.
///
/// Initialised once from the credential store and then mutated only by
/// [`login`](Self::login), [`register`](Self::register) and
/// [`logout`](Self::logout).
pub struct SessionContext {
    store: CredentialStore,
    current: RwLock<Option<CurrentUser>>,
}

impl SessionContext {
    /// Restores the persisted login from `store`.
    pub fn init(store: CredentialStore) -> Result<Self, SessionError> {
        let current = store.load()?;
        if let Some(user) = &current {
            info!(username = %user.username, "Restored login");
        }
        Ok(Self { store, current: RwLock::new(current) })
    }

    /// Opens the store at `path`, or an in-memory one when `path` is `None`.
    pub fn open(path: Option<&Path>) -> Result<Self, SessionError> {
        let store = match path {
            Some(path) => CredentialStore::new(path)?,
            None => CredentialStore::in_memory()?,
        };
        Self::init(store)
    }

    pub fn in_memory() -> Result<Self, SessionError> {
        Self::open(None)
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(_) => {
                warn!("Session lock poisoned");
                None
            }
        }
    }

    /// Identity recorded on acknowledgements: the current user's email.
    pub fn actor(&self) -> Option<String> {
        self.current_user().map(|u| u.email)
    }

    /// Logs in with `email`. The username is the part before `@`.
    pub fn login(&self, email: &str, password: &str) -> Result<CurrentUser, SessionError> {
        let email = require("email", email)?;
        require("password", password)?;

        let username = email.split('@').next().filter(|s| !s.is_empty()).unwrap_or(GUEST);
        self.set(CurrentUser { username: username.to_string(), email: email.to_string() })
    }

    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<CurrentUser, SessionError> {
        let username = require("username", username)?;
        let email = require("email", email)?;
        require("password", password)?;

        self.set(CurrentUser { username: username.to_string(), email: email.to_string() })
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        self.store.clear()?;
        if let Ok(mut guard) = self.current.write() {
            if let Some(user) = guard.take() {
                info!(username = %user.username, "Logged out");
            }
        }
        Ok(())
    }

    fn set(&self, user: CurrentUser) -> Result<CurrentUser, SessionError> {
        self.store.save(&user)?;
        let Ok(mut guard) = self.current.write() else {
            warn!("Session lock poisoned");
            return Ok(user);
        };
        info!(username = %user.username, "Logged in");
        *guard = Some(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_derives_username() {
        let session = SessionContext::in_memory().unwrap();
        let user = session.login("ada@example.com", "pw").unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(session.actor().as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_login_without_local_part_is_guest() {
        let session = SessionContext::in_memory().unwrap();
        let user = session.login("@example.com", "pw").unwrap();
        assert_eq!(user.username, "guest");
    }

    #[test]
    fn test_login_requires_fields() {
        let session = SessionContext::in_memory().unwrap();
        assert!(matches!(session.login("", "pw"), Err(SessionError::MissingField("email"))));
        assert!(matches!(session.login("a@b.c", " "), Err(SessionError::MissingField("password"))));
        assert!(matches!(session.register("", "a@b.c", "pw"), Err(SessionError::MissingField("username"))));
        assert_eq!(session.current_user(), None);
    }

    #[test]
    fn test_logout_clears_persisted_login() {
        let store = CredentialStore::in_memory().unwrap();
        store.save(&CurrentUser { username: "grace".into(), email: "grace@example.com".into() }).unwrap();

        let session = SessionContext::init(store).unwrap();
        assert_eq!(session.current_user().map(|u| u.username), Some("grace".to_string()));

        session.logout().unwrap();
        assert_eq!(session.current_user(), None);
        assert_eq!(session.actor(), None);
    }
}
