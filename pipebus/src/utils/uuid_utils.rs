//! UUID generation.

use uuid::Uuid;

/// Generates a new random UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Mints a correlation identifier (time-ordered UUID v7).
#[must_use]
pub fn new_correlation_id() -> Uuid {
    Uuid::now_v7()
}
