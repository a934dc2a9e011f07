use super::StoreBackend;
use oracle_types::StoreError;
use std::path::Path;

/// Embedded log-structured KV, the production backend (§4.1). sled
/// compacts in the background on its own I/O thread; we don't manage that
/// here.
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)
            .map_err(|e| StoreError::StorageUnavailable(format!("sled open failed: {e}")))?;
        Ok(Self { db })
    }
}

impl StoreBackend for SledBackend {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.db.get(key.as_bytes()) {
            Ok(Some(v)) => Ok(Some(v.to_vec())),
            Ok(None) => Ok(None),
            Err(_) => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(prefix.as_bytes()) {
            let (k, v) = item.map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
            let key = String::from_utf8_lossy(&k).into_owned();
            out.push((key, v.to_vec()));
        }
        Ok(out)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.db
            .clear()
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }
}
