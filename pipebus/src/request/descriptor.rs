//! Request descriptors and the send-request operation.

use super::SendRequestPipe;
use crate::cancellation::run_until_cancelled;
use crate::config::RequestSettings;
use crate::context::{Address, ConsumeContext, PipeContext};
use crate::endpoint::SendEndpoint;
use crate::errors::{BusError, ConfigurationError};
use crate::message::{Envelope, Message};
use crate::scheduling::{MessageScheduler, RequestTimeoutExpired, ScheduleSendExt, ScheduledMessage};
use crate::utils::{expiration_after, now_utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Saga state that can issue requests.
pub trait SagaInstance: Send + Sync {
    /// The saga's correlation id.
    fn correlation_id(&self) -> Uuid;
}

type Setter<S> = dyn Fn(&mut S, Option<Uuid>) + Send + Sync;
type Getter<S> = dyn Fn(&S) -> Option<Uuid> + Send + Sync;

/// Where a request timeout will be scheduled.
enum TimeoutRoute {
    Service(Arc<dyn SendEndpoint>),
    Ambient(Arc<dyn MessageScheduler>),
}

/// Describes one kind of request a saga sends.
pub struct RequestDescriptor<S> {
    settings: RequestSettings,
    set_request_id: Box<Setter<S>>,
    get_request_id: Option<Box<Getter<S>>>,
}

impl<S: SagaInstance> RequestDescriptor<S> {
    /// Creates a descriptor that persists request ids with `set_request_id`.
    pub fn new(
        settings: RequestSettings,
        set_request_id: impl Fn(&mut S, Option<Uuid>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            settings,
            set_request_id: Box::new(set_request_id),
            get_request_id: None,
        }
    }

    /// Adds an accessor used to match replies and timeouts.
    #[must_use]
    pub fn with_request_id_accessor(
        mut self,
        get_request_id: impl Fn(&S) -> Option<Uuid> + Send + Sync + 'static,
    ) -> Self {
        self.get_request_id = Some(Box::new(get_request_id));
        self
    }

    /// The request settings.
    #[must_use]
    pub const fn settings(&self) -> &RequestSettings {
        &self.settings
    }

    /// Returns true if `request_id` is the outstanding request of `state`.
    ///
    /// Without an accessor every id is accepted.
    #[must_use]
    pub fn accepts(&self, state: &S, request_id: Uuid) -> bool {
        self.get_request_id
            .as_ref()
            .map_or(true, |get| get(state) == Some(request_id))
    }

    /// Returns true if the envelope is a reply or timeout for the
    /// outstanding request of `state`.
    #[must_use]
    pub fn accepts_envelope(&self, state: &S, envelope: &Envelope) -> bool {
        let request_id = if envelope.is::<RequestTimeoutExpired>() {
            envelope.decode::<RequestTimeoutExpired>().ok().map(|t| t.request_id)
        } else {
            envelope.request_id
        };
        request_id.is_some_and(|id| self.accepts(state, id))
    }

    /// Clears the persisted request id once the request has completed.
    pub fn complete(&self, state: &mut S) {
        (self.set_request_id)(state, None);
    }

    /// Sends `request` to the service address and tracks it in `state`.
    ///
    /// A fresh request id is minted for the send, stamped on the envelope
    /// along with the context's input address as response address, and
    /// written into `state` before the send completes. When a timeout is
    /// configured, a [`RequestTimeoutExpired`] is scheduled to the input
    /// address through the scheduling service if one is configured, else
    /// through the context's ambient scheduler.
    ///
    /// The timeout route is resolved before anything is sent.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError` if the timeout is invalid, or if a timeout is
    ///   configured but no scheduler is available; nothing is sent.
    /// - Endpoint resolution and send errors from the transport, unchanged;
    ///   resolution failures happen before a request id is minted.
    /// - `TimeoutNotScheduled` if the request was sent but its timeout could
    ///   not be scheduled.
    pub async fn send_request<M: Message>(
        &self,
        ctx: &ConsumeContext,
        state: &mut S,
        request: &M,
    ) -> Result<Uuid, BusError> {
        let timeout = self.settings.timeout()?;
        let correlation_id = state.correlation_id();
        let endpoint = ctx.get_send_endpoint(&self.settings.service_address).await?;

        let route = match timeout {
            Some(_) => Some(self.timeout_route(ctx).await?),
            None => None,
        };

        let envelope = Envelope::from_message(request)?
            .with_correlation_id(correlation_id)
            .with_source_address(ctx.input_address().clone());

        let request_id = {
            let pipe = SendRequestPipe::new(ctx.input_address().clone(), state, self.set_request_id.as_ref());
            run_until_cancelled(ctx.cancellation(), endpoint.send(envelope, &pipe)).await?;
            pipe.request_id()
                .ok_or_else(|| BusError::Internal("Send endpoint did not run the request pipe".to_string()))?
        };
        debug!(
            %request_id,
            %correlation_id,
            address = %self.settings.service_address,
            "Request sent"
        );

        if let (Some(timeout), Some(route)) = (timeout, route) {
            schedule_timeout(ctx, route, timeout, correlation_id, request_id)
                .await
                .map_err(|source| {
                    warn!(%request_id, error = %source, "Request sent but timeout not scheduled");
                    BusError::TimeoutNotScheduled {
                        request_id,
                        source: Box::new(source),
                    }
                })?;
        }

        Ok(request_id)
    }

    async fn timeout_route(&self, ctx: &ConsumeContext) -> Result<TimeoutRoute, BusError> {
        if let Some(address) = &self.settings.scheduling_service_address {
            return Ok(TimeoutRoute::Service(ctx.get_send_endpoint(address).await?));
        }
        if let Some(scheduler) = ctx.scheduler() {
            return Ok(TimeoutRoute::Ambient(scheduler));
        }
        Err(ConfigurationError::new(
            "A request timeout was specified but no message scheduler was specified or available",
        )
        .with_issue("scheduling_service_address", "not set and no scheduler on the consume context")
        .into())
    }
}

async fn schedule_timeout(
    ctx: &ConsumeContext,
    route: TimeoutRoute,
    timeout: Duration,
    correlation_id: Uuid,
    request_id: Uuid,
) -> Result<ScheduledMessage, BusError> {
    let now = now_utc();
    let expiration_time = expiration_after(now, timeout)?;
    let message = RequestTimeoutExpired {
        timestamp: now,
        expiration_time,
        correlation_id,
        request_id,
    };
    let envelope = Envelope::from_message(&message)?
        .with_correlation_id(correlation_id)
        .with_request_id(request_id);
    let destination: &Address = ctx.input_address();

    let scheduled = match route {
        TimeoutRoute::Service(endpoint) => {
            endpoint.schedule_send(destination, expiration_time, envelope).await?
        }
        TimeoutRoute::Ambient(scheduler) => {
            scheduler.schedule_send(destination, expiration_time, envelope).await?
        }
    };
    debug!(%request_id, expiration = %expiration_time, "Request timeout scheduled");
    Ok(scheduled)
}

impl<S> std::fmt::Debug for RequestDescriptor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("settings", &self.settings)
            .field("has_accessor", &self.get_request_id.is_some())
            .finish_non_exhaustive()
    }
}
