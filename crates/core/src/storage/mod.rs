mod error;
mod traits;
mod types;

pub use error::{RepositoryError, Result};
pub use traits::RecordSource;
pub use types::{compare_values, Direction, Document, Fields, Filter, FilterOp, OrderBy, Query};
