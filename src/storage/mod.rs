//! Durable storage for the user registry, the token snapshot and the
//! cluster-map state.
//!
//! Everything is stored as JSON documents addressed by a short key (a file
//! name for [`FileStore`]). The [`KvStore`] trait is the seam that lets tests
//! swap in [`MemoryStore`].

mod file;
mod memory;
pub mod models;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Registered users: user id -> [`models::UserRecord`]
pub const USERS_KEY: &str = "users.json";

/// Valid tokens at the time of the last save: [`models::TokenList`]
pub const TOKENS_KEY: &str = "tokens.json";

/// Primary proxy URL and cluster map: [`crate::cluster::ProxyState`]
pub const PROXY_KEY: &str = "proxy.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Secret for user '{0}' is not valid UTF-8")]
    Utf8(String),
}

/// Byte-level key-value persistence.
pub trait KvStore: Send + Sync {
    /// Returns `None` when nothing was ever saved under `key`.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replaces the value stored under `key`.
    fn save(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Load and decode a JSON document.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.load(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and save a JSON document.
pub fn save_json<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let data = serde_json::to_vec_pretty(value)?;
    store.save(key, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::TokenList;

    #[test]
    fn test_load_missing_key_returns_none() {
        let store = MemoryStore::new();
        let loaded: Option<TokenList> = load_json(&store, TOKENS_KEY).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_then_load_json() {
        let store = MemoryStore::new();
        let list = TokenList {
            tokens: vec!["a".to_string(), "b".to_string()],
            version: 7,
        };
        save_json(&store, TOKENS_KEY, &list).unwrap();

        let loaded: TokenList = load_json(&store, TOKENS_KEY).unwrap().unwrap();
        assert_eq!(loaded, list);
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let store = MemoryStore::new();
        store.save(TOKENS_KEY, b"{not json").unwrap();

        let result: Result<Option<TokenList>, _> = load_json(&store, TOKENS_KEY);
        assert!(matches!(result, Err(StorageError::Json(_))));
    }
}
