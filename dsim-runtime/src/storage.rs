//! On-disk key-value store
//!
//! One zstd-compressed file per key under a storage directory. Writes go to
//! a temporary file first and are renamed into place.

use dsim_core::storage::{KeyValueStore, StorageError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const EXTENSION: &str = "json.zst";
const COMPRESSION_LEVEL: i32 = 3;

/// Default storage location (`<data dir>/dsim`)
pub fn default_storage_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("dsim"))
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("File store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.{}", name, EXTENSION))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let compressed = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw = zstd::decode_all(compressed.as_slice())?;
        String::from_utf8(raw)
            .map(Some)
            .map_err(|e| StorageError::Backend(format!("{} is not UTF-8: {}", key, e)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let compressed = zstd::encode_all(value.as_bytes(), COMPRESSION_LEVEL)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &compressed)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: empty scratch directory unique to this test
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dsim-store-{}-{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_set_get_remove() {
        let dir = scratch("roundtrip");
        let mut store = FileStore::open(&dir).unwrap();

        assert!(store.get("dsim.recordings").unwrap().is_none());
        store.set("dsim.recordings", "[1,2,3]").unwrap();
        store.set("dsim.recordings", "[4]").unwrap();
        assert_eq!(store.get("dsim.recordings").unwrap().as_deref(), Some("[4]"));

        // A second handle sees the same data
        let reopened = FileStore::open(&dir).unwrap();
        assert_eq!(reopened.get("dsim.recordings").unwrap().as_deref(), Some("[4]"));

        store.remove("dsim.recordings").unwrap();
        store.remove("dsim.recordings").unwrap();
        assert!(store.get("dsim.recordings").unwrap().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_values_are_compressed_on_disk() {
        let dir = scratch("compressed");
        let mut store = FileStore::open(&dir).unwrap();
        let value = "frame".repeat(1000);
        store.set("big", &value).unwrap();

        let on_disk = fs::read(dir.join("big.json.zst")).unwrap();
        assert!(on_disk.len() < value.len() / 10);
        assert_eq!(zstd::decode_all(on_disk.as_slice()).unwrap(), value.as_bytes());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_keys_are_sanitized() {
        let dir = scratch("sanitize");
        let mut store = FileStore::open(&dir).unwrap();
        store.set("../escape/key", "x").unwrap();

        assert!(dir.join(".._escape_key.json.zst").exists());
        assert_eq!(store.get("../escape/key").unwrap().as_deref(), Some("x"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_garbage_file_is_an_error() {
        let dir = scratch("garbage");
        let store = FileStore::open(&dir).unwrap();
        fs::write(dir.join("bad.json.zst"), b"not zstd").unwrap();
        assert!(store.get("bad").is_err());

        let _ = fs::remove_dir_all(&dir);
    }
}
