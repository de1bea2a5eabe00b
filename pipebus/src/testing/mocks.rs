//! Mock filters, connections and schedulers.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::context::{Address, PayloadBag, PipeContext};
use crate::errors::{BusError, ResourceAcquisitionError, SendError};
use crate::message::Envelope;
use crate::pipeline::{Filter, Pipe, ProbeContext};
use crate::scheduling::{MessageScheduler, ScheduledMessage};
use crate::transport::{ConnectionContext, TransportResource};
use crate::utils::{generate_uuid, Timestamp};

/// Log shared between recording filters.
pub type SharedLog = Arc<Mutex<Vec<String>>>;

/// A filter that appends its label to a shared log and forwards.
#[derive(Debug, Clone)]
pub struct RecordingFilter {
    label: String,
    log: SharedLog,
}

impl RecordingFilter {
    /// Creates a new, empty shared log.
    #[must_use]
    pub fn shared_log() -> SharedLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// Creates a recording filter writing to `log`.
    #[must_use]
    pub fn new(label: impl Into<String>, log: SharedLog) -> Self {
        Self {
            label: label.into(),
            log,
        }
    }
}

#[async_trait]
impl<C: PipeContext> Filter<C> for RecordingFilter {
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), BusError> {
        self.log.lock().push(self.label.clone());
        next.send(ctx).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.create_scope("record").add("label", self.label.clone());
    }
}

/// A filter that always fails without forwarding.
#[derive(Debug)]
pub struct FailingFilter {
    error: String,
    calls: AtomicUsize,
}

impl FailingFilter {
    /// Creates a filter failing with `error`.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times the filter ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: PipeContext> Filter<C> for FailingFilter {
    async fn send(&self, _ctx: &C, _next: &dyn Pipe<C>) -> Result<(), BusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BusError::filter(anyhow::anyhow!(self.error.clone())))
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.create_scope("fail").add("error", self.error.clone());
    }
}

/// Acquisition and release counters for a [`MockConnection`].
#[derive(Debug, Default)]
pub struct ConnectionStats {
    acquired: AtomicUsize,
    released: AtomicUsize,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

impl ConnectionStats {
    /// Resources acquired so far.
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Resources released so far.
    #[must_use]
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Resources currently open.
    #[must_use]
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Highest number of resources open at the same time.
    #[must_use]
    pub fn max_concurrently_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }
}

/// A channel handed out by [`MockConnection`].
#[derive(Debug)]
pub struct MockResource {
    id: usize,
    stats: Arc<ConnectionStats>,
    disposed: AtomicBool,
}

impl MockResource {
    /// The channel number.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }
}

impl TransportResource for MockResource {
    fn describe(&self) -> String {
        format!("channel {}", self.id)
    }

    fn dispose(&self) {
        assert!(
            !self.disposed.swap(true, Ordering::SeqCst),
            "channel {} disposed twice",
            self.id
        );
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        self.stats.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A connection context producing [`MockResource`] channels.
#[derive(Debug, Clone)]
pub struct MockConnection {
    name: String,
    cancellation: CancellationToken,
    payloads: PayloadBag,
    stats: Arc<ConnectionStats>,
    fail_acquisition: bool,
    acquire_delay: Option<Duration>,
}

impl MockConnection {
    /// Creates a connection with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cancellation: CancellationToken::new(),
            payloads: PayloadBag::new(),
            stats: Arc::default(),
            fail_acquisition: false,
            acquire_delay: None,
        }
    }

    /// Makes every acquisition fail.
    #[must_use]
    pub fn failing_acquisition(mut self) -> Self {
        self.fail_acquisition = true;
        self
    }

    /// Delays every acquisition.
    #[must_use]
    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = Some(delay);
        self
    }

    /// Acquisition counters shared by all clones of this connection.
    #[must_use]
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }
}

impl PipeContext for MockConnection {
    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn payloads(&self) -> &PayloadBag {
        &self.payloads
    }
}

#[async_trait]
impl ConnectionContext for MockConnection {
    type Resource = MockResource;

    fn connection_name(&self) -> String {
        self.name.clone()
    }

    async fn create_resource(&self) -> Result<MockResource, ResourceAcquisitionError> {
        if let Some(delay) = self.acquire_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_acquisition {
            return Err(ResourceAcquisitionError::new("channel", &self.name, "connection refused"));
        }

        let id = self.stats.acquired.fetch_add(1, Ordering::SeqCst) + 1;
        let open = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(MockResource {
            id,
            stats: Arc::clone(&self.stats),
            disposed: AtomicBool::new(false),
        })
    }
}

/// One call recorded by [`RecordingScheduler`].
#[derive(Debug, Clone)]
pub struct ScheduledSend {
    /// Delivery destination.
    pub destination: Address,
    /// Requested delivery time.
    pub deliver_at: Timestamp,
    /// The scheduled envelope.
    pub envelope: Envelope,
    /// Token returned to the caller.
    pub token_id: Uuid,
}

/// A scheduler that records requests instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<ScheduledSend>>,
    cancelled: Mutex<Vec<Uuid>>,
    fail: bool,
}

impl RecordingScheduler {
    /// Creates a scheduler that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheduler that rejects every request.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Scheduled sends, in call order.
    #[must_use]
    pub fn scheduled(&self) -> Vec<ScheduledSend> {
        self.scheduled.lock().clone()
    }

    /// Cancelled tokens, in call order.
    #[must_use]
    pub fn cancelled(&self) -> Vec<Uuid> {
        self.cancelled.lock().clone()
    }
}

#[async_trait]
impl MessageScheduler for RecordingScheduler {
    async fn schedule_send(
        &self,
        destination: &Address,
        deliver_at: Timestamp,
        envelope: Envelope,
    ) -> Result<ScheduledMessage, BusError> {
        if self.fail {
            return Err(SendError::new("scheduler", "scheduler unavailable").into());
        }
        let scheduled = ScheduledMessage {
            token_id: generate_uuid(),
            scheduled_time: deliver_at,
            destination: destination.clone(),
            message_id: envelope.message_id,
        };
        self.scheduled.lock().push(ScheduledSend {
            destination: destination.clone(),
            deliver_at,
            envelope,
            token_id: scheduled.token_id,
        });
        Ok(scheduled)
    }

    async fn cancel_scheduled_send(&self, token_id: Uuid) -> Result<(), BusError> {
        self.cancelled.lock().push(token_id);
        Ok(())
    }
}
