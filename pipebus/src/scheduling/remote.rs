//! Scheduling through a remote scheduling service.

use super::{CancelScheduledMessage, MessageScheduler, ScheduleMessage, ScheduledMessage};
use crate::context::Address;
use crate::endpoint::{SendEndpoint, SendEndpointProvider};
use crate::errors::BusError;
use crate::message::{Envelope, SendContext};
use crate::pipeline::EmptyPipe;
use crate::utils::{generate_uuid, Timestamp};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Sends scheduling commands to the endpoint of a scheduling service.
#[async_trait]
pub trait ScheduleSendExt {
    /// Asks the scheduling service behind this endpoint to deliver
    /// `envelope` to `destination` at `deliver_at`.
    async fn schedule_send(
        &self,
        destination: &Address,
        deliver_at: Timestamp,
        envelope: Envelope,
    ) -> Result<ScheduledMessage, BusError>;

    /// Asks the scheduling service to drop a pending delivery.
    async fn cancel_scheduled_send(&self, token_id: uuid::Uuid) -> Result<(), BusError>;
}

#[async_trait]
impl<E: SendEndpoint + ?Sized> ScheduleSendExt for E {
    async fn schedule_send(
        &self,
        destination: &Address,
        deliver_at: Timestamp,
        envelope: Envelope,
    ) -> Result<ScheduledMessage, BusError> {
        let scheduled = ScheduledMessage {
            token_id: generate_uuid(),
            scheduled_time: deliver_at,
            destination: destination.clone(),
            message_id: envelope.message_id,
        };
        let command = ScheduleMessage {
            token_id: scheduled.token_id,
            scheduled_time: deliver_at,
            destination: destination.clone(),
            payload: envelope,
        };

        debug!(
            scheduler = %self.address(),
            destination = %destination,
            token_id = %scheduled.token_id,
            "Scheduling message"
        );
        self.send(Envelope::from_message(&command)?, &EmptyPipe::<SendContext>::new())
            .await?;
        Ok(scheduled)
    }

    async fn cancel_scheduled_send(&self, token_id: uuid::Uuid) -> Result<(), BusError> {
        let command = CancelScheduledMessage { token_id };
        self.send(Envelope::from_message(&command)?, &EmptyPipe::<SendContext>::new())
            .await
    }
}

/// A [`MessageScheduler`] backed by a remote scheduling service.
pub struct EndpointScheduler {
    scheduler_address: Address,
    endpoints: Arc<dyn SendEndpointProvider>,
}

impl EndpointScheduler {
    /// Creates a scheduler that sends its commands to `scheduler_address`.
    #[must_use]
    pub fn new(scheduler_address: Address, endpoints: Arc<dyn SendEndpointProvider>) -> Self {
        Self {
            scheduler_address,
            endpoints,
        }
    }

    /// The scheduling service address.
    #[must_use]
    pub fn scheduler_address(&self) -> &Address {
        &self.scheduler_address
    }
}

#[async_trait]
impl MessageScheduler for EndpointScheduler {
    async fn schedule_send(
        &self,
        destination: &Address,
        deliver_at: Timestamp,
        envelope: Envelope,
    ) -> Result<ScheduledMessage, BusError> {
        let endpoint = self.endpoints.get_send_endpoint(&self.scheduler_address).await?;
        ScheduleSendExt::schedule_send(endpoint.as_ref(), destination, deliver_at, envelope).await
    }

    async fn cancel_scheduled_send(&self, token_id: uuid::Uuid) -> Result<(), BusError> {
        let endpoint = self.endpoints.get_send_endpoint(&self.scheduler_address).await?;
        ScheduleSendExt::cancel_scheduled_send(endpoint.as_ref(), token_id).await
    }
}

impl std::fmt::Debug for EndpointScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointScheduler")
            .field("scheduler_address", &self.scheduler_address)
            .finish_non_exhaustive()
    }
}
