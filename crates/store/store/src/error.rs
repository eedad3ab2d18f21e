/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An error from the underlying storage backend.
    #[error("storage error: {0}")]
    Storage(String),
}
