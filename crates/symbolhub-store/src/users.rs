//! Accounts and credential checks.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use rand::rngs::OsRng;
use rusqlite::params;

use symbolhub_shared::Credentials;

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{format_timestamp, parse_timestamp, User, UserProfile};

impl Database {
    /// Register a new account. A taken username is a `Conflict`.
    pub fn create_user(&self, creds: &Credentials) -> Result<UserProfile> {
        creds.validate_new()?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(creds.password.as_bytes(), &salt)
            .map_err(|e| StoreError::Credential(e.to_string()))?
            .to_string();

        self.conn()
            .execute(
                "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
                params![creds.username, hash, format_timestamp(Utc::now())],
            )
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict(format!("username {} is taken", creds.username))
                }
                other => other,
            })?;

        let id = row_id(self.conn().last_insert_rowid())?;
        tracing::info!(user_id = id, username = %creds.username, "user created");

        Ok(UserProfile {
            id,
            username: creds.username.clone(),
        })
    }

    /// Check a username / password pair. `None` when either is wrong.
    pub fn verify_credentials(&self, creds: &Credentials) -> Result<Option<UserProfile>> {
        let user = match self.get_user_by_name(&creds.username) {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        // The anonymous user's placeholder hash does not parse.
        let Ok(parsed) = PasswordHash::new(&user.password_hash) else {
            return Ok(None);
        };

        if Argon2::default()
            .verify_password(creds.password.as_bytes(), &parsed)
            .is_err()
        {
            tracing::debug!(username = %creds.username, "credential mismatch");
            return Ok(None);
        }

        Ok(Some(UserProfile {
            id: user.id,
            username: user.username,
        }))
    }

    pub fn get_user(&self, id: i32) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .map_err(not_found("user"))
    }

    pub fn get_user_by_name(&self, username: &str) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .map_err(not_found("user"))
    }

    pub fn get_user_profile(&self, id: i32) -> Result<UserProfile> {
        self.conn()
            .query_row(
                "SELECT id, username FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(UserProfile {
                        id: row.get(0)?,
                        username: row.get(1)?,
                    })
                },
            )
            .map_err(not_found("user"))
    }
}

/// Narrow a SQLite rowid to the 32-bit identity range.
pub(crate) fn row_id(rowid: i64) -> Result<i32> {
    i32::try_from(rowid)
        .map_err(|_| StoreError::Sqlite(rusqlite::Error::IntegralValueOutOfRange(0, rowid)))
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_str: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: parse_timestamp(3, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbolhub_shared::constants::{ANONYMOUS_USERNAME, ANONYMOUS_USER_ID};

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    #[test]
    fn signup_then_login() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_user(&creds("rappy", "correct horse")).unwrap();
        assert_ne!(profile.id, ANONYMOUS_USER_ID);

        let stored = db.get_user(profile.id).unwrap();
        assert_ne!(stored.password_hash, "correct horse");

        let ok = db.verify_credentials(&creds("rappy", "correct horse")).unwrap();
        assert_eq!(ok, Some(profile));

        assert_eq!(db.verify_credentials(&creds("rappy", "wrong pass")).unwrap(), None);
        assert_eq!(db.verify_credentials(&creds("nobody", "whatever")).unwrap(), None);
    }

    #[test]
    fn duplicate_username_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&creds("rappy", "password1")).unwrap();
        let err = db.create_user(&creds("rappy", "password2")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn anonymous_user_cannot_log_in() {
        let db = Database::open_in_memory().unwrap();
        let anon = db.get_user_profile(ANONYMOUS_USER_ID).unwrap();
        assert_eq!(anon.username, ANONYMOUS_USERNAME);
        assert_eq!(db.verify_credentials(&creds(ANONYMOUS_USERNAME, "!")).unwrap(), None);
    }

    #[test]
    fn unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_user_profile(999), Err(StoreError::NotFound("user"))));
    }
}
