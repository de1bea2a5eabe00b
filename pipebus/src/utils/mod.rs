//! Utility functions for identifiers and timestamps.

mod timestamps;
mod uuid_utils;

pub use timestamps::{expiration_after, now_utc, Timestamp};
pub use uuid_utils::{generate_uuid, new_correlation_id};
