use crate::backend::StoreBackend;
use oracle_types::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// The Persistent Store (§4.1): `put`/`get`/`delete`/`scan`/`clear` over a
/// pluggable synchronous backend, exposed as async so callers never block
/// the executor. Values are arbitrary JSON-encodable records.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn StoreBackend>,
}

impl PersistentStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub async fn put_json<T: Serialize + Send + 'static>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        let backend = self.backend.clone();
        let key = key.into();
        tokio::task::spawn_blocking(move || backend.put(&key, bytes))
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("task join error: {e}")))?
    }

    pub async fn get_json<T: DeserializeOwned + Send + 'static>(
        &self,
        key: impl Into<String>,
    ) -> Result<Option<T>, StoreError> {
        let backend = self.backend.clone();
        let key = key.into();
        let raw = tokio::task::spawn_blocking(move || backend.get(&key))
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("task join error: {e}")))??;
        match raw {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, key: impl Into<String>) -> Result<(), StoreError> {
        let backend = self.backend.clone();
        let key = key.into();
        tokio::task::spawn_blocking(move || backend.delete(&key))
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("task join error: {e}")))?
    }

    pub async fn scan_json<T: DeserializeOwned + Send + 'static>(
        &self,
        prefix: impl Into<String>,
    ) -> Result<Vec<(String, T)>, StoreError> {
        let backend = self.backend.clone();
        let prefix = prefix.into();
        let raw = tokio::task::spawn_blocking(move || backend.scan_prefix(&prefix))
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("task join error: {e}")))??;
        let mut out = Vec::with_capacity(raw.len());
        for (key, bytes) in raw {
            match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => out.push((key, value)),
                Err(e) => {
                    tracing::warn!(key, error = %e, "skipping record with unparsable value");
                }
            }
        }
        Ok(out)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || backend.clear())
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("task join error: {e}")))?
    }
}
