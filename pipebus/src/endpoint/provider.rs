//! Endpoint traits implemented by transports.

use crate::context::Address;
use crate::errors::BusError;
use crate::message::{Envelope, SendContext};
use crate::pipeline::Pipe;
use async_trait::async_trait;
use std::sync::Arc;

/// A resolved destination that can transmit envelopes.
#[async_trait]
pub trait SendEndpoint: Send + Sync {
    /// The address this endpoint sends to.
    fn address(&self) -> &Address;

    /// Sends an envelope.
    ///
    /// The endpoint builds a [`SendContext`] around the envelope and runs
    /// `pipe` over it before transmission, so the pipe may set addressing
    /// and correlation headers.
    async fn send(&self, envelope: Envelope, pipe: &dyn Pipe<SendContext>) -> Result<(), BusError>;
}

/// Resolves addresses to send endpoints.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SendEndpointProvider: Send + Sync {
    /// Resolves the send endpoint for `address`.
    async fn get_send_endpoint(&self, address: &Address) -> Result<Arc<dyn SendEndpoint>, BusError>;
}
