mod error;
mod keys;
mod serialization;
mod traits;

pub use error::{Result, StoreError};
pub use keys::{last_backfill_key, last_refresh_key, snapshot_key};
pub use serialization::{
    deserialize_records, deserialize_timestamp, serialize_records, serialize_timestamp,
    SerializationError,
};
pub use traits::LocalStore;
