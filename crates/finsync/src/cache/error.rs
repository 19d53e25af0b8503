use std::time::Duration;

use thiserror::Error;

use finsync_core::cache::StoreError;
use finsync_core::storage::RepositoryError;

/// Errors surfaced by domain caches.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Remote source error: {0}")]
    Remote(#[from] RepositoryError),
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),
    #[error("{kind} refresh timed out after {after:?}")]
    Timeout { kind: &'static str, after: Duration },
    #[error("{kind} refresh failed and no persisted snapshot exists: {cause}")]
    NoFallback {
        kind: &'static str,
        cause: Box<CacheError>,
    },
}

/// Result type for domain cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
