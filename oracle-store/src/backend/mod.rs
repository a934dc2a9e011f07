mod file_backend;
mod sled_backend;

pub use file_backend::FileBackend;
pub use sled_backend::SledBackend;

use oracle_types::StoreError;

/// A synchronous keyed byte store. Implementations must make every
/// mutation durable before returning, or fail with
/// [`StoreError::StorageUnavailable`] (§4.1). Callers drive this trait from
/// `tokio::task::spawn_blocking` since neither backend is async internally.
pub trait StoreBackend: Send + Sync + 'static {
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// Snapshot of every `(key, value)` whose key starts with `prefix`,
    /// stable only for the duration of this call (§4.1).
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}
