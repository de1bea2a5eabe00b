//! Test doubles for pipes, transports and schedulers.
//!
//! This module provides:
//! - Recording and failing filters
//! - An in-memory transport with failure and delay injection
//! - A mock connection whose resources count acquisitions and releases
//! - A recording scheduler
//! - Envelope assertions

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_message_type, assert_request_envelope, assert_timeout_for};
pub use fixtures::{InMemorySendEndpoint, InMemoryTransport};
pub use mocks::{
    ConnectionStats, FailingFilter, MockConnection, MockResource, RecordingFilter,
    RecordingScheduler, ScheduledSend, SharedLog,
};
