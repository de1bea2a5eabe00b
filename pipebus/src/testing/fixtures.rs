//! In-memory transport for tests.

use crate::context::Address;
use crate::endpoint::{SendEndpoint, SendEndpointProvider};
use crate::errors::{BusError, SendError};
use crate::message::{Envelope, SendContext};
use crate::pipeline::Pipe;
use crate::utils::now_utc;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type SentLog = Arc<Mutex<Vec<Envelope>>>;
type AddressSet = Arc<Mutex<HashSet<Address>>>;

/// A send endpoint that appends sent envelopes to a shared log.
#[derive(Debug, Clone)]
pub struct InMemorySendEndpoint {
    address: Address,
    sent: SentLog,
    rejected: SentLog,
    failing: AddressSet,
    pipe_runs: usize,
}

impl InMemorySendEndpoint {
    /// Creates a standalone endpoint with its own log.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            sent: Arc::default(),
            rejected: Arc::default(),
            failing: Arc::default(),
            pipe_runs: 1,
        }
    }

    /// Envelopes sent through this endpoint's log.
    #[must_use]
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl SendEndpoint for InMemorySendEndpoint {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn send(&self, envelope: Envelope, pipe: &dyn Pipe<SendContext>) -> Result<(), BusError> {
        let ctx = SendContext::new(envelope, self.address.clone());
        for _ in 0..self.pipe_runs {
            pipe.send(&ctx).await?;
        }

        if self.failing.lock().contains(&self.address) {
            let message_id = ctx.message_id();
            self.rejected.lock().push(ctx.into_envelope());
            return Err(SendError::new(self.address.as_str(), "transport rejected the message")
                .with_message_id(message_id)
                .into());
        }

        let mut envelope = ctx.into_envelope();
        envelope.sent_time = Some(now_utc());
        self.sent.lock().push(envelope);
        Ok(())
    }
}

/// An in-memory transport: resolves any address to an
/// [`InMemorySendEndpoint`] sharing one sent log.
///
/// Counts resolutions per address and can inject resolution delays,
/// resolution failures and send failures.
#[derive(Debug)]
pub struct InMemoryTransport {
    sent: SentLog,
    rejected: SentLog,
    failing_sends: AddressSet,
    failing_resolution: Mutex<HashSet<Address>>,
    resolutions: Mutex<HashMap<Address, usize>>,
    resolve_count: AtomicUsize,
    resolve_delay: Option<Duration>,
    pipe_runs: usize,
}

impl InMemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sent: Arc::default(),
            rejected: Arc::default(),
            failing_sends: Arc::default(),
            failing_resolution: Mutex::new(HashSet::new()),
            resolutions: Mutex::new(HashMap::new()),
            resolve_count: AtomicUsize::new(0),
            resolve_delay: None,
            pipe_runs: 1,
        }
    }

    /// Delays every resolution.
    #[must_use]
    pub fn with_resolve_delay(mut self, delay: Duration) -> Self {
        self.resolve_delay = Some(delay);
        self
    }

    /// Runs each send pipe `runs` times per send, as a retrying transport
    /// would.
    #[must_use]
    pub fn with_pipe_runs(mut self, runs: usize) -> Self {
        self.pipe_runs = runs.max(1);
        self
    }

    /// Makes resolution of `address` fail.
    pub fn fail_resolution(&self, address: Address) {
        self.failing_resolution.lock().insert(address);
    }

    /// Makes sends to `address` fail after the send pipe has run.
    pub fn fail_sends_to(&self, address: Address) {
        self.failing_sends.lock().insert(address);
    }

    /// Total number of resolutions performed.
    #[must_use]
    pub fn resolve_count(&self) -> usize {
        self.resolve_count.load(Ordering::SeqCst)
    }

    /// Number of resolutions performed for `address`.
    #[must_use]
    pub fn resolve_count_for(&self, address: &Address) -> usize {
        self.resolutions.lock().get(address).copied().unwrap_or(0)
    }

    /// Every envelope sent, in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }

    /// Envelopes whose send was rejected, as the send pipe left them.
    #[must_use]
    pub fn rejected(&self) -> Vec<Envelope> {
        self.rejected.lock().clone()
    }

    /// Envelopes sent to `address`, in send order.
    #[must_use]
    pub fn sent_to(&self, address: &Address) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .filter(|e| e.destination_address.as_ref() == Some(address))
            .cloned()
            .collect()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SendEndpointProvider for InMemoryTransport {
    async fn get_send_endpoint(&self, address: &Address) -> Result<Arc<dyn SendEndpoint>, BusError> {
        self.resolve_count.fetch_add(1, Ordering::SeqCst);
        *self.resolutions.lock().entry(address.clone()).or_insert(0) += 1;

        if let Some(delay) = self.resolve_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_resolution.lock().contains(address) {
            return Err(BusError::endpoint_resolution(address.as_str(), "no route to address"));
        }

        Ok(Arc::new(InMemorySendEndpoint {
            address: address.clone(),
            sent: Arc::clone(&self.sent),
            rejected: Arc::clone(&self.rejected),
            failing: Arc::clone(&self.failing_sends),
            pipe_runs: self.pipe_runs,
        }))
    }
}
