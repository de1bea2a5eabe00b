//! Scheduling commands and the request timeout event.

use crate::context::Address;
use crate::message::{Envelope, Message};
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Asks a scheduling service to deliver `payload` to `destination` at
/// `scheduled_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleMessage {
    /// Token identifying the scheduled delivery, used to cancel it.
    pub token_id: Uuid,
    /// When the payload should be delivered.
    pub scheduled_time: Timestamp,
    /// Where the payload should be delivered.
    pub destination: Address,
    /// The envelope to deliver.
    pub payload: Envelope,
}

impl Message for ScheduleMessage {
    const MESSAGE_TYPE: &'static str = "pipebus:ScheduleMessage";
}

/// Cancels a delivery previously requested with [`ScheduleMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelScheduledMessage {
    /// The token of the delivery to cancel.
    pub token_id: Uuid,
}

impl Message for CancelScheduledMessage {
    const MESSAGE_TYPE: &'static str = "pipebus:CancelScheduledMessage";
}

/// Delivered to the requester when no response arrived in time.
///
/// `expiration_time - timestamp` equals the configured request timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTimeoutExpired {
    /// When the request was sent.
    pub timestamp: Timestamp,
    /// When the request expires.
    pub expiration_time: Timestamp,
    /// Correlation id of the requesting saga.
    pub correlation_id: Uuid,
    /// The request that timed out.
    pub request_id: Uuid,
}

impl Message for RequestTimeoutExpired {
    const MESSAGE_TYPE: &'static str = "pipebus:RequestTimeoutExpired";
}
