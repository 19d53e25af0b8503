use thiserror::Error;

/// Errors reported by a remote record source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    /// The remote could not be reached. Refreshes fall back on this.
    #[error("Remote source unavailable: {0}")]
    Unavailable(String),
    /// The remote was reached but refused the request.
    #[error("Request rejected: {0}")]
    Rejected(String),
    /// A document did not match the record shape it was read as.
    #[error("Malformed {entity_type} document: {reason}")]
    Malformed {
        entity_type: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
