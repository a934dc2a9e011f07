use super::StoreBackend;
use oracle_types::StoreError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File-with-atomic-rename backend for small deployments (§4.1). Keys are
/// percent-escaped into flat filenames under `root` so prefix scans are a
/// single directory listing.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| StoreError::StorageUnavailable(format!("mkdir failed: {e}")))?;
        Ok(Self { root })
    }

    fn encode(key: &str) -> String {
        key.replace('%', "%25").replace('/', "%2F")
    }

    fn decode(name: &str) -> String {
        name.replace("%2F", "/").replace("%25", "%")
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(Self::encode(key))
    }
}

impl StoreBackend for FileBackend {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let target = self.path_for(key);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| StoreError::StorageUnavailable(format!("tempfile create failed: {e}")))?;
        tmp.write_all(&value)
            .map_err(|e| StoreError::StorageUnavailable(format!("write failed: {e}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::StorageUnavailable(format!("fsync failed: {e}")))?;
        tmp.persist(&target)
            .map_err(|e| StoreError::StorageUnavailable(format!("rename failed: {e}")))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(_) => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::StorageUnavailable(e.to_string())),
        }
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut out = Vec::new();
        let entries = fs::read_dir(&self.root)
            .map_err(|e| StoreError::StorageUnavailable(format!("readdir failed: {e}")))?;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let file_name = entry.file_name();
            let encoded = file_name.to_string_lossy();
            let key = Self::decode(&encoded);
            if !key.starts_with(prefix) {
                continue;
            }
            if let Ok(bytes) = fs::read(entry.path()) {
                out.push((key, bytes));
            }
        }
        Ok(out)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| StoreError::StorageUnavailable(format!("readdir failed: {e}")))?;
        for entry in entries.flatten() {
            let _ = fs::remove_file(entry.path());
        }
        Ok(())
    }
}
