//! The ambient scheduler capability.

use crate::context::Address;
use crate::errors::BusError;
use crate::message::Envelope;
use crate::utils::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle to a scheduled delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledMessage {
    /// Token used to cancel the delivery.
    pub token_id: Uuid,
    /// When the envelope will be delivered.
    pub scheduled_time: Timestamp,
    /// Where it will be delivered.
    pub destination: Address,
    /// Id of the scheduled envelope.
    pub message_id: Uuid,
}

/// Schedules envelopes for later delivery.
#[async_trait]
pub trait MessageScheduler: Send + Sync {
    /// Delivers `envelope` to `destination` at `deliver_at`.
    ///
    /// Times in the past deliver as soon as possible.
    async fn schedule_send(
        &self,
        destination: &Address,
        deliver_at: Timestamp,
        envelope: Envelope,
    ) -> Result<ScheduledMessage, BusError>;

    /// Cancels a pending delivery. Unknown or already delivered tokens are
    /// ignored.
    async fn cancel_scheduled_send(&self, token_id: Uuid) -> Result<(), BusError>;
}
