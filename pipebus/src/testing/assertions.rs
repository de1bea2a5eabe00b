//! Assertions over sent envelopes.

use crate::context::Address;
use crate::message::{Envelope, Message};
use crate::scheduling::RequestTimeoutExpired;
use std::time::Duration;
use uuid::Uuid;

/// Asserts that the envelope carries message type `M`.
pub fn assert_message_type<M: Message>(envelope: &Envelope) {
    assert!(
        envelope.is::<M>(),
        "Expected message type '{}', got '{}'",
        M::MESSAGE_TYPE,
        envelope.message_type
    );
}

/// Asserts that the envelope is a request expecting replies at
/// `response_address`, and returns its request id.
pub fn assert_request_envelope(envelope: &Envelope, response_address: &Address) -> Uuid {
    assert_eq!(
        envelope.response_address.as_ref(),
        Some(response_address),
        "Unexpected response address on message {}",
        envelope.message_id
    );
    envelope
        .request_id
        .unwrap_or_else(|| panic!("Message {} has no request id", envelope.message_id))
}

/// Asserts that the envelope is the timeout of `request_id` after `timeout`.
pub fn assert_timeout_for(envelope: &Envelope, request_id: Uuid, timeout: Duration) -> RequestTimeoutExpired {
    assert_message_type::<RequestTimeoutExpired>(envelope);
    let expired: RequestTimeoutExpired = envelope
        .decode()
        .unwrap_or_else(|e| panic!("Undecodable timeout message: {e}"));
    assert_eq!(expired.request_id, request_id, "Timeout is for another request");
    let elapsed = (expired.expiration_time - expired.timestamp).to_std().ok();
    assert_eq!(elapsed, Some(timeout), "Unexpected timeout duration");
    expired
}
