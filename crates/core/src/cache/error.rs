use thiserror::Error;

/// Local store failures. Callers treat every variant the same way (log and
/// carry on with in-memory state); the split only matters for diagnostics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing storage could not be opened or is no longer reachable.
    #[error("Local store unavailable: {0}")]
    Unavailable(String),
    /// A read or write against an open store failed.
    #[error("Local store I/O failed: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
