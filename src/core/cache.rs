//! On-disk response cache
//!
//! Responses are stored as one file per key in a flat directory. Keys are
//! SHA-256 digests of the request, so they are always safe file names.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;

/// Error types for cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Derive the cache key for a request
///
/// The key is the lowercase hex SHA-256 of the method, path and JSON body.
/// Object keys are hashed in sorted order, so bodies that differ only in key
/// order share a key.
pub fn cache_key(method: &str, path: &str, body: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(path.as_bytes());
    hasher.update(canonicalize(body).to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Flat-directory key/value store
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Open a cache rooted at `dir`, creating the directory if needed
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    /// Read a cached value; a missing entry is `Ok(None)`
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a value, replacing any previous entry
    ///
    /// The value is written to a temporary file and renamed into place so
    /// concurrent readers never see a partial entry.
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, value).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove an entry; removing a missing entry succeeds
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).await.unwrap();
        let key = cache_key("POST", "/v1/chat/completions", &json!({"model": "gpt-4"}));

        assert_eq!(cache.get(&key).await.unwrap(), None);

        cache.set(&key, b"first").await.unwrap();
        cache.set(&key, b"second").await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"second".to_vec()));

        cache.delete(&key).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
        cache.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        DiskCache::new(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).await.unwrap();
        assert!(matches!(
            cache.get("../escape").await,
            Err(CacheError::InvalidKey(_))
        ));
        assert!(matches!(
            cache.set("", b"x").await,
            Err(CacheError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_cache_key_is_stable() {
        let a = cache_key("POST", "/v1/chat/completions", &json!({"a": 1, "b": 2}));
        let b = cache_key("POST", "/v1/chat/completions", &json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let other_path = cache_key("POST", "/v1/completions", &json!({"a": 1, "b": 2}));
        let other_method = cache_key("PUT", "/v1/chat/completions", &json!({"a": 1, "b": 2}));
        assert_ne!(a, other_path);
        assert_ne!(a, other_method);
    }
}
