//! Maps SQLite failures onto `StoreError`.

use finsync_core::cache::StoreError;

/// Codes meaning the database file itself cannot be used right now.
fn is_unavailable(code: rusqlite::ErrorCode) -> bool {
    matches!(
        code,
        rusqlite::ErrorCode::CannotOpen
            | rusqlite::ErrorCode::DatabaseBusy
            | rusqlite::ErrorCode::DatabaseLocked
            | rusqlite::ErrorCode::ReadOnly
            | rusqlite::ErrorCode::NotADatabase
    )
}

fn map_rusqlite_error(err: &rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) if is_unavailable(failure.code) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Io(err.to_string()),
    }
}

pub fn map_tokio_rusqlite_error(err: tokio_rusqlite::Error) -> StoreError {
    match &err {
        tokio_rusqlite::Error::Rusqlite(e) => map_rusqlite_error(e),
        tokio_rusqlite::Error::ConnectionClosed => {
            StoreError::Unavailable("connection closed".to_string())
        }
        _ => StoreError::Io(err.to_string()),
    }
}
