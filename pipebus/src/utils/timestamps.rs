//! Timestamp utilities.

use crate::errors::ConfigurationError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// UTC timestamp used for send times and scheduled deliveries.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Computes `from + timeout`.
///
/// # Errors
///
/// Returns `ConfigurationError` if the timeout does not fit in a timestamp.
pub fn expiration_after(from: Timestamp, timeout: Duration) -> Result<Timestamp, ConfigurationError> {
    chrono::Duration::from_std(timeout)
        .ok()
        .and_then(|delta| from.checked_add_signed(delta))
        .ok_or_else(|| {
            ConfigurationError::new(format!("Timeout of {timeout:?} overflows the timestamp range"))
        })
}
