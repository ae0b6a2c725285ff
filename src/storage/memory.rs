use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{KvStore, StorageError};

/// In-memory [`KvStore`] for tests and throwaway nodes.
///
/// Saves can be made to fail on demand to exercise persistence error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Vec<u8>>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `save` fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.documents.lock().contains_key(key)
    }
}

impl KvStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.documents.lock().get(key).cloned())
    }

    fn save(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "save disabled").into());
        }
        self.documents.lock().insert(key.to_string(), data.to_vec());
        Ok(())
    }
}
