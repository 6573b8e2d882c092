//! SQLite-backed credential storage.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::session::CurrentUser;

/// Errors from credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Lock error")]
    Lock,
}

/// Holds at most one persisted login.
pub struct CredentialStore {
    conn: Mutex<Connection>,
}

impl CredentialStore {
    /// Opens (or creates) the store at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                slot INTEGER PRIMARY KEY CHECK (slot = 1),
                username TEXT NOT NULL,
                email TEXT NOT NULL,
                saved_at TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Replaces the persisted login with `user`.
    pub fn save(&self, user: &CurrentUser) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;

        conn.execute(
            r#"INSERT INTO credentials (slot, username, email, saved_at)
               VALUES (1, ?1, ?2, ?3)
               ON CONFLICT(slot) DO UPDATE SET
               username = excluded.username, email = excluded.email, saved_at = excluded.saved_at"#,
            params![user.username, user.email, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    /// Returns the persisted login, if any.
    pub fn load(&self) -> Result<Option<CurrentUser>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;

        let mut stmt = conn.prepare("SELECT username, email FROM credentials WHERE slot = 1")?;
        let result = stmt.query_row([], |row| {
            Ok(CurrentUser {
                username: row.get(0)?,
                email: row.get(1)?,
            })
        });

        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Forgets the persisted login.
    pub fn clear(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Lock)?;
        conn.execute("DELETE FROM credentials", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> CurrentUser {
        CurrentUser { username: name.to_string(), email: format!("{name}@example.com") }
    }

    #[test]
    fn test_save_load_clear() {
        let store = CredentialStore::in_memory().unwrap();
        assert_eq!(store.load().unwrap(), None);

        store.save(&user("ada")).unwrap();
        assert_eq!(store.load().unwrap(), Some(user("ada")));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_replaces_previous_login() {
        let store = CredentialStore::in_memory().unwrap();
        store.save(&user("ada")).unwrap();
        store.save(&user("grace")).unwrap();
        assert_eq!(store.load().unwrap(), Some(user("grace")));
    }

    #[test]
    fn test_persists_across_reopen() {
        let path = std::env::temp_dir().join(format!("tracelens-cred-{}.db", std::process::id()));
        {
            let store = CredentialStore::new(&path).unwrap();
            store.save(&user("linus")).unwrap();
        }
        let reopened = CredentialStore::new(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), Some(user("linus")));
        drop(reopened);
        let _ = std::fs::remove_file(&path);
    }
}
