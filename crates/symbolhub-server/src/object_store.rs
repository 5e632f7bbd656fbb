//! Filesystem object store for symbol art files and their previews.
//!
//! Objects are addressed by a random UUID key chosen before the catalog
//! transaction starts. Asset downloads go through time-limited URLs signed
//! with a keyed BLAKE3 hash; previews are public.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Which namespace an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Asset,
    Preview,
}

impl ObjectKind {
    fn dir(self) -> &'static str {
        match self {
            ObjectKind::Asset => "assets",
            ObjectKind::Preview => "previews",
        }
    }
}

/// A signed, expiring download locator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let mut resolved = base.to_path_buf();
    for component in target.strip_prefix(base).unwrap_or(target).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(base) {
        return Err(ServerError::BadRequest("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct ObjectStore {
    base_path: PathBuf,
    max_size: usize,
    url_key: [u8; 32],
    public_base_url: String,
}

impl ObjectStore {
    pub async fn new(
        base_path: PathBuf,
        max_size: usize,
        url_key: [u8; 32],
        public_base_url: String,
    ) -> Result<Self, ServerError> {
        for kind in [ObjectKind::Asset, ObjectKind::Preview] {
            let dir = base_path.join(kind.dir());
            fs::create_dir_all(&dir).await.map_err(|e| {
                ServerError::ObjectStorage(format!(
                    "Failed to create object directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        info!(path = %base_path.display(), "Object store initialized");

        Ok(Self {
            base_path,
            max_size,
            url_key,
            public_base_url,
        })
    }

    /// A fresh object key.
    pub fn new_key() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub async fn put(&self, kind: ObjectKind, key: &str, data: &[u8]) -> Result<(), ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest(format!("Empty {} upload", kind.dir())));
        }
        if data.len() > self.max_size {
            return Err(ServerError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let path = self.object_path(kind, key)?;
        fs::write(&path, data).await.map_err(|e| {
            ServerError::ObjectStorage(format!("Failed to write object {key}: {e}"))
        })?;

        debug!(key, kind = kind.dir(), size = data.len(), "Stored object");
        Ok(())
    }

    pub async fn get(&self, kind: ObjectKind, key: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.object_path(kind, key)?;

        if !path.exists() {
            return Err(ServerError::NotFound("object".into()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            ServerError::ObjectStorage(format!("Failed to read object {key}: {e}"))
        })?;

        debug!(key, kind = kind.dir(), size = data.len(), "Retrieved object");
        Ok(data)
    }

    /// Remove an object. A missing object is not an error.
    pub async fn delete(&self, kind: ObjectKind, key: &str) -> Result<(), ServerError> {
        let path = self.object_path(kind, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, kind = kind.dir(), "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServerError::ObjectStorage(format!(
                "Failed to delete object {key}: {e}"
            ))),
        }
    }

    /// Public locator of a preview image.
    pub fn preview_url(&self, key: &str) -> String {
        format!("{}/previews/{key}", self.public_base_url)
    }

    /// Time-limited locator for an asset, valid for `ttl_secs`.
    pub fn signed_url(&self, key: &str, ttl_secs: u64) -> SignedUrl {
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl);
        let sig = self.signature(key, expires);
        SignedUrl {
            url: format!(
                "{}/objects/{key}?expires={expires}&sig={}",
                self.public_base_url,
                hex::encode(sig)
            ),
            expires_at: DateTime::from_timestamp(expires, 0).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Check a signature produced by [`ObjectStore::signed_url`].
    pub fn verify_signature(&self, key: &str, expires: i64, sig_hex: &str) -> bool {
        if Utc::now().timestamp() > expires {
            return false;
        }
        let Ok(sig) = hex::decode(sig_hex) else {
            return false;
        };
        let expected = self.signature(key, expires);
        sig.len() == expected.len() && bool::from(sig.as_slice().ct_eq(&expected))
    }

    fn signature(&self, key: &str, expires: i64) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_keyed(&self.url_key);
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(&expires.to_be_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Keys are always UUIDs, which rules out separators and `..`.
    fn object_path(&self, kind: ObjectKind, key: &str) -> Result<PathBuf, ServerError> {
        if Uuid::parse_str(key).is_err() {
            return Err(ServerError::NotFound("object".into()));
        }
        let base = self.base_path.join(kind.dir());
        ensure_within(&base, &base.join(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (ObjectStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(
            dir.path().to_path_buf(),
            1024,
            [7u8; 32],
            "http://symbols.test".into(),
        )
        .await
        .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _dir) = test_store().await;
        let key = ObjectStore::new_key();

        store.put(ObjectKind::Asset, &key, b"symbol-art").await.unwrap();
        assert_eq!(store.get(ObjectKind::Asset, &key).await.unwrap(), b"symbol-art");
        // Namespaces are separate.
        assert!(store.get(ObjectKind::Preview, &key).await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _dir) = test_store().await;
        let key = ObjectStore::new_key();
        store.put(ObjectKind::Preview, &key, b"png").await.unwrap();

        store.delete(ObjectKind::Preview, &key).await.unwrap();
        assert!(store.get(ObjectKind::Preview, &key).await.is_err());
        store.delete(ObjectKind::Preview, &key).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized() {
        let (store, _dir) = test_store().await;
        let key = ObjectStore::new_key();
        assert!(store.put(ObjectKind::Asset, &key, b"").await.is_err());

        let err = store
            .put(ObjectKind::Asset, &key, &vec![0u8; 2048])
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::TooLarge { size: 2048, max: 1024 }));
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.get(ObjectKind::Asset, "../../etc/passwd").await.is_err());
        assert!(store.put(ObjectKind::Asset, "..", b"x").await.is_err());
    }

    #[test]
    fn test_ensure_within() {
        let base = Path::new("/srv/objects/assets");
        assert!(ensure_within(base, &base.join("abc")).is_ok());
        assert!(ensure_within(base, &base.join("../secrets")).is_err());
    }

    #[tokio::test]
    async fn test_signed_url_round_trip() {
        let (store, _dir) = test_store().await;
        let key = ObjectStore::new_key();
        let signed = store.signed_url(&key, 60);

        assert!(signed
            .url
            .starts_with(&format!("http://symbols.test/objects/{key}?expires=")));
        let expires = signed.expires_at.timestamp();
        let sig = signed.url.rsplit("sig=").next().unwrap();

        assert!(store.verify_signature(&key, expires, sig));
        assert!(!store.verify_signature(&key, expires + 1, sig));
        assert!(!store.verify_signature(&ObjectStore::new_key(), expires, sig));
        assert!(!store.verify_signature(&key, expires, "zz"));
    }

    #[tokio::test]
    async fn test_expired_signature_rejected() {
        let (store, _dir) = test_store().await;
        let key = ObjectStore::new_key();
        let past = Utc::now().timestamp() - 10;
        let sig = hex::encode(store.signature(&key, past));
        assert!(!store.verify_signature(&key, past, &sig));
    }
}
