use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{KvStore, StorageError};

/// Stores each key as a file inside a data directory.
///
/// Writes go to a temporary sibling first and are then renamed over the
/// target, so a crash mid-write leaves the previous version intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open or create a store rooted at the given directory
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StorageError> {
        fs::create_dir_all(data_dir.as_ref())?;
        Ok(Self {
            root: data_dir.as_ref().to_path_buf(),
        })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl KvStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let target = self.path_for(key);
        let tmp = self.root.join(format!(".{key}.tmp"));
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &target)?;
        tracing::trace!(path = %target.display(), bytes = data.len(), "Saved document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("data");

        FileStore::open(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();

        assert!(store.load("users.json").unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).unwrap();

        store.save("users.json", b"first").unwrap();
        store.save("users.json", b"second").unwrap();

        assert_eq!(store.load("users.json").unwrap().unwrap(), b"second");
        assert!(!temp.path().join(".users.json.tmp").exists());
    }
}
