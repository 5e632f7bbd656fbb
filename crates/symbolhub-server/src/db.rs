//! Shared handle to the catalog database.
//!
//! The store is synchronous, so every call is moved onto tokio's blocking
//! pool and serialized behind a mutex. A closure that bails out early drops
//! its `rusqlite::Transaction`, which rolls the write back.

use std::path::Path;
use std::sync::{Arc, Mutex};

use symbolhub_store::{Database, StoreError};

use crate::error::ServerError;

/// Cloneable handle owned by the application state. Opened once at startup
/// and closed explicitly on shutdown.
#[derive(Clone)]
pub struct Db {
    inner: Arc<Mutex<Option<Database>>>,
}

impl Db {
    /// Open the catalog file, running migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_database(Database::open_at(path)?))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(db))),
        }
    }

    /// Run `f` against the database on the blocking pool.
    pub async fn run<F, T, E>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&mut Database) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<ServerError>,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|_| ServerError::Internal("database lock poisoned".into()))?;
            let db = guard
                .as_mut()
                .ok_or_else(|| ServerError::Internal("database is closed".into()))?;
            f(db).map_err(Into::into)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("database task failed: {e}")))?
    }

    /// Close the underlying connection. Later calls to [`Db::run`] fail.
    pub async fn close(&self) -> Result<(), ServerError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let db = inner
                .lock()
                .map_err(|_| ServerError::Internal("database lock poisoned".into()))?
                .take();
            match db {
                Some(db) => db.close().map_err(ServerError::from),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| ServerError::Internal(format!("database task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbolhub_shared::constants::ANONYMOUS_USER_ID;

    #[tokio::test]
    async fn run_then_close() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Db::open(&dir.path().join("catalog.db")).unwrap();

        let anonymous = db
            .run(|db| db.get_user_profile(ANONYMOUS_USER_ID))
            .await
            .unwrap();
        assert_eq!(anonymous.username, "anonymous");

        db.close().await.unwrap();
        let err = db.run(|db| db.list_tags()).await.unwrap_err();
        assert!(matches!(err, ServerError::Internal(_)));

        // Closing twice is harmless.
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn closure_errors_keep_their_kind() {
        let db = Db::from_database(Database::open_in_memory().unwrap());
        let err = db.run(|db| db.get_post(42)).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
