use thiserror::Error;

/// Errors surfaced by the persistent store. `StorageUnavailable` is the
/// distinguished failure mode callers must degrade gracefully on (§4.1,
/// §7): the node keeps running, reads fall back to "not found".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors from the ZK proving pipeline (§4.3). `ProverInternal` is the only
/// variant callers may retry, and only once.
#[derive(Debug, Error)]
pub enum ProverError {
    #[error("circuit setup failed: {0}")]
    SetupFailed(String),
    #[error("witness invalid: {0}")]
    WitnessInvalid(String),
    #[error("prover internal error: {0}")]
    ProverInternal(String),
}

/// Errors a job handler can terminate with. `DataShape` and `Proving`
/// failures are permanent (no retry); `Transient` goes through the retry
/// queue.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("transient error: {0}")]
    Transient(String),
    #[error("data shape error: {0}")]
    DataShape(String),
    #[error("proving error: {0}")]
    Proving(#[from] ProverError),
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}
