//! The context handed to inbound (consume) pipes.

use super::{Address, PayloadBag, PipeContext};
use crate::cancellation::{run_until_cancelled, CancellationToken};
use crate::endpoint::{SendEndpoint, SendEndpointProvider};
use crate::errors::BusError;
use crate::message::Envelope;
use crate::scheduling::MessageScheduler;
use std::sync::Arc;

/// Context for a received message.
///
/// Carries the local input address (where replies and self-addressed timeout
/// messages are routed), the endpoint provider used to reach other endpoints,
/// and the received envelope, if any.
#[derive(Clone)]
pub struct ConsumeContext {
    cancellation: CancellationToken,
    payloads: PayloadBag,
    input_address: Address,
    send_endpoints: Arc<dyn SendEndpointProvider>,
    envelope: Option<Arc<Envelope>>,
}

impl ConsumeContext {
    /// Creates a consume context for the given input address.
    #[must_use]
    pub fn new(input_address: Address, send_endpoints: Arc<dyn SendEndpointProvider>) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            payloads: PayloadBag::new(),
            input_address,
            send_endpoints,
            envelope: None,
        }
    }

    /// Binds the context to a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Uses the given payload bag.
    #[must_use]
    pub fn with_payloads(mut self, payloads: PayloadBag) -> Self {
        self.payloads = payloads;
        self
    }

    /// Attaches the received envelope.
    #[must_use]
    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(Arc::new(envelope));
        self
    }

    /// Installs an ambient message scheduler.
    ///
    /// The scheduler goes into a child payload bag, so contexts this one was
    /// cloned from or into beforehand do not see it.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<dyn MessageScheduler>) -> Self {
        self.payloads = self.payloads.child();
        self.payloads.insert(scheduler);
        self
    }

    /// The local input address.
    #[must_use]
    pub fn input_address(&self) -> &Address {
        &self.input_address
    }

    /// The received envelope, if any.
    #[must_use]
    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_deref()
    }

    /// The ambient in-process scheduler, if one is installed.
    #[must_use]
    pub fn scheduler(&self) -> Option<Arc<dyn MessageScheduler>> {
        self.payloads
            .try_get::<Arc<dyn MessageScheduler>>()
            .map(|scheduler| Arc::clone(scheduler.as_ref()))
    }

    /// Resolves a send endpoint, honoring this context's cancellation.
    pub async fn get_send_endpoint(&self, address: &Address) -> Result<Arc<dyn SendEndpoint>, BusError> {
        run_until_cancelled(&self.cancellation, self.send_endpoints.get_send_endpoint(address)).await
    }
}

impl PipeContext for ConsumeContext {
    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn payloads(&self) -> &PayloadBag {
        &self.payloads
    }
}

impl std::fmt::Debug for ConsumeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumeContext")
            .field("input_address", &self.input_address)
            .field("message_id", &self.envelope.as_ref().map(|e| e.message_id))
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
