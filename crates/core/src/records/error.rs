use thiserror::Error;

/// Errors raised while parsing date strings into periods.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
}

pub type Result<T> = std::result::Result<T, PeriodError>;
