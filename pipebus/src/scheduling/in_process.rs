//! Timer-driven scheduler running inside the bus process.

use super::{MessageScheduler, ScheduledMessage};
use crate::context::Address;
use crate::endpoint::SendEndpointProvider;
use crate::errors::BusError;
use crate::message::{Envelope, SendContext};
use crate::pipeline::EmptyPipe;
use crate::utils::{generate_uuid, now_utc, Timestamp};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Delivers scheduled envelopes with tokio timers.
///
/// Pending deliveries are lost when the process exits.
pub struct InProcessScheduler {
    endpoints: Arc<dyn SendEndpointProvider>,
    pending: Arc<DashMap<Uuid, JoinHandle<()>>>,
}

impl InProcessScheduler {
    /// Creates a scheduler delivering through `endpoints`.
    #[must_use]
    pub fn new(endpoints: Arc<dyn SendEndpointProvider>) -> Self {
        Self {
            endpoints,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Number of deliveries that have not fired yet.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.iter().filter(|entry| !entry.value().is_finished()).count()
    }

    fn prune(&self) {
        self.pending.retain(|_, handle| !handle.is_finished());
    }
}

async fn deliver(endpoints: Arc<dyn SendEndpointProvider>, destination: Address, envelope: Envelope) {
    let message_id = envelope.message_id;
    let result = match endpoints.get_send_endpoint(&destination).await {
        Ok(endpoint) => endpoint.send(envelope, &EmptyPipe::<SendContext>::new()).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => debug!(destination = %destination, %message_id, "Delivered scheduled message"),
        Err(e) => warn!(
            destination = %destination,
            %message_id,
            error = %e,
            "Scheduled delivery failed"
        ),
    }
}

#[async_trait]
impl MessageScheduler for InProcessScheduler {
    async fn schedule_send(
        &self,
        destination: &Address,
        deliver_at: Timestamp,
        envelope: Envelope,
    ) -> Result<ScheduledMessage, BusError> {
        self.prune();

        let scheduled = ScheduledMessage {
            token_id: generate_uuid(),
            scheduled_time: deliver_at,
            destination: destination.clone(),
            message_id: envelope.message_id,
        };
        let delay = (deliver_at - now_utc()).to_std().unwrap_or(Duration::ZERO);
        let deadline = Instant::now().checked_add(delay);
        let endpoints = Arc::clone(&self.endpoints);
        let target = destination.clone();

        let handle = tokio::spawn(async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => tokio::time::sleep(delay).await,
            }
            deliver(endpoints, target, envelope).await;
        });
        self.pending.insert(scheduled.token_id, handle);

        debug!(
            destination = %destination,
            token_id = %scheduled.token_id,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduled in-process delivery"
        );
        Ok(scheduled)
    }

    async fn cancel_scheduled_send(&self, token_id: Uuid) -> Result<(), BusError> {
        if let Some((_, handle)) = self.pending.remove(&token_id) {
            handle.abort();
            debug!(%token_id, "Cancelled scheduled delivery");
        }
        Ok(())
    }
}

impl Drop for InProcessScheduler {
    fn drop(&mut self) {
        for entry in self.pending.iter() {
            entry.value().abort();
        }
    }
}

impl std::fmt::Debug for InProcessScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessScheduler")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}
