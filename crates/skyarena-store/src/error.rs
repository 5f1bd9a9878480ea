//! Error types for the storage layer.

/// Errors a storage call can resolve with.
///
/// Storage failures never reach gameplay as panics: the gateway logs
/// them and passes them to the caller's callback, and the mutation
/// simply does not take effect.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file could not be encoded or decoded.
    #[error("storage format error: {0}")]
    Format(#[from] serde_json::Error),

    /// The backend rejected the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The storage thread is gone (shut down or crashed).
    #[error("storage is unavailable")]
    Unavailable,

    /// The lobby was read before it was loaded or set.
    /// This is a programming error in the caller.
    #[error("lobby position read before it was loaded")]
    LobbyNotLoaded,
}
