//! Context for outbound sends.

use super::Envelope;
use crate::cancellation::CancellationToken;
use crate::context::{Address, PayloadBag, PipeContext};
use parking_lot::RwLock;
use uuid::Uuid;

/// The context a send pipe operates on.
///
/// Send pipes run inside the endpoint's send call, before the message is
/// handed to the wire; they may set addressing and correlation headers.
#[derive(Debug)]
pub struct SendContext {
    envelope: RwLock<Envelope>,
    cancellation: CancellationToken,
    payloads: PayloadBag,
}

impl SendContext {
    /// Creates a send context for an envelope bound to `destination`.
    #[must_use]
    pub fn new(mut envelope: Envelope, destination: Address) -> Self {
        envelope.destination_address = Some(destination);
        Self {
            envelope: RwLock::new(envelope),
            cancellation: CancellationToken::new(),
            payloads: PayloadBag::new(),
        }
    }

    /// Binds the context to a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// The message id.
    #[must_use]
    pub fn message_id(&self) -> Uuid {
        self.envelope.read().message_id
    }

    /// The message type.
    #[must_use]
    pub fn message_type(&self) -> String {
        self.envelope.read().message_type.clone()
    }

    /// The request id, if set.
    #[must_use]
    pub fn request_id(&self) -> Option<Uuid> {
        self.envelope.read().request_id
    }

    /// Sets the request id.
    pub fn set_request_id(&self, request_id: Uuid) {
        self.envelope.write().request_id = Some(request_id);
    }

    /// The response address, if set.
    #[must_use]
    pub fn response_address(&self) -> Option<Address> {
        self.envelope.read().response_address.clone()
    }

    /// Sets where responses should be sent.
    pub fn set_response_address(&self, address: Address) {
        self.envelope.write().response_address = Some(address);
    }

    /// The destination address.
    #[must_use]
    pub fn destination_address(&self) -> Option<Address> {
        self.envelope.read().destination_address.clone()
    }

    /// Sets a header.
    pub fn set_header(&self, key: impl Into<String>, value: serde_json::Value) {
        self.envelope.write().headers.insert(key.into(), value);
    }

    /// Returns a copy of the current envelope.
    #[must_use]
    pub fn envelope(&self) -> Envelope {
        self.envelope.read().clone()
    }

    /// Consumes the context, returning the envelope as it should go on the wire.
    #[must_use]
    pub fn into_envelope(self) -> Envelope {
        self.envelope.into_inner()
    }
}

impl PipeContext for SendContext {
    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn payloads(&self) -> &PayloadBag {
        &self.payloads
    }
}
