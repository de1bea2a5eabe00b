//! The assembled bus.

use crate::cancellation::{run_until_cancelled, CancellationToken};
use crate::config::BusSettings;
use crate::context::{Address, ConsumeContext, PipeContext};
use crate::endpoint::{PublishEndpointProvider, SendEndpointProvider};
use crate::errors::BusError;
use crate::message::{Envelope, Message, SendContext};
use crate::pipeline::{Pipe, ProbeContext};
use crate::scheduling::MessageScheduler;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Sends, publishes and dispatches messages through configured pipes.
pub struct MessageBus {
    settings: BusSettings,
    endpoints: Arc<dyn SendEndpointProvider>,
    publish: PublishEndpointProvider,
    scheduler: Option<Arc<dyn MessageScheduler>>,
    consume_pipe: Arc<dyn Pipe<ConsumeContext>>,
    send_pipe: Arc<dyn Pipe<SendContext>>,
    cancellation: CancellationToken,
}

impl MessageBus {
    pub(super) fn new(
        settings: BusSettings,
        endpoints: Arc<dyn SendEndpointProvider>,
        publish: PublishEndpointProvider,
        scheduler: Option<Arc<dyn MessageScheduler>>,
        consume_pipe: Arc<dyn Pipe<ConsumeContext>>,
        send_pipe: Arc<dyn Pipe<SendContext>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            settings,
            endpoints,
            publish,
            scheduler,
            consume_pipe,
            send_pipe,
            cancellation,
        }
    }

    /// The bus input address.
    #[must_use]
    pub const fn input_address(&self) -> &Address {
        &self.settings.input_address
    }

    /// The cached endpoint provider.
    #[must_use]
    pub fn endpoints(&self) -> Arc<dyn SendEndpointProvider> {
        Arc::clone(&self.endpoints)
    }

    /// The ambient scheduler, if one is configured.
    #[must_use]
    pub fn scheduler(&self) -> Option<Arc<dyn MessageScheduler>> {
        self.scheduler.clone()
    }

    /// The bus cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Cancels every in-flight and future operation of the bus.
    pub fn shutdown(&self, reason: impl Into<String>) {
        self.cancellation.cancel(reason);
    }

    /// Creates a consume context bound to this bus, optionally carrying a
    /// received envelope.
    #[must_use]
    pub fn consume_context(&self, envelope: Option<Envelope>) -> ConsumeContext {
        let mut ctx = ConsumeContext::new(self.settings.input_address.clone(), Arc::clone(&self.endpoints))
            .with_cancellation(self.cancellation.child_token());
        if let Some(envelope) = envelope {
            ctx = ctx.with_envelope(envelope);
        }
        if let Some(scheduler) = &self.scheduler {
            ctx = ctx.with_scheduler(Arc::clone(scheduler));
        }
        ctx
    }

    /// Sends a message to `address` through the send pipe.
    ///
    /// Returns the id of the sent message.
    ///
    /// # Errors
    ///
    /// Returns endpoint resolution, send pipe and transport errors unchanged.
    pub async fn send<M: Message>(&self, address: &Address, message: &M) -> Result<Uuid, BusError> {
        self.send_envelope(address, Envelope::from_message(message)?).await
    }

    /// Sends a prepared envelope to `address` through the send pipe.
    ///
    /// # Errors
    ///
    /// Returns endpoint resolution, send pipe and transport errors unchanged.
    pub async fn send_envelope(&self, address: &Address, envelope: Envelope) -> Result<Uuid, BusError> {
        let envelope = envelope.with_source_address(self.settings.input_address.clone());
        let message_id = envelope.message_id;

        run_until_cancelled(&self.cancellation, async {
            let endpoint = self.endpoints.get_send_endpoint(address).await?;
            endpoint.send(envelope, self.send_pipe.as_ref()).await
        })
        .await?;

        debug!(address = %address, %message_id, "Message sent");
        Ok(message_id)
    }

    /// Publishes a message to its topic address through the send pipe.
    ///
    /// # Errors
    ///
    /// Returns endpoint resolution, send pipe and transport errors unchanged.
    pub async fn publish<M: Message>(&self, message: &M) -> Result<Uuid, BusError> {
        let address = self.publish.publish_address(M::MESSAGE_TYPE)?;
        self.send(&address, message).await
    }

    /// Runs a received envelope through the consume pipe.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the consume pipe, or `Cancelled` if
    /// the bus was shut down.
    pub async fn dispatch(&self, envelope: Envelope) -> Result<(), BusError> {
        let message_id = envelope.message_id;
        let message_type = envelope.message_type.clone();
        let ctx = self.consume_context(Some(envelope));

        let result = run_until_cancelled(ctx.cancellation(), self.consume_pipe.send(&ctx)).await;
        match &result {
            Ok(()) => debug!(%message_id, %message_type, "Message consumed"),
            Err(e) => warn!(%message_id, %message_type, error = %e, "Consume pipe faulted"),
        }
        result
    }

    /// Describes both pipes as JSON.
    #[must_use]
    pub fn probe(&self) -> serde_json::Value {
        let mut consume = ProbeContext::new();
        self.consume_pipe.probe(&mut consume);
        let mut send = ProbeContext::new();
        self.send_pipe.probe(&mut send);

        serde_json::json!({
            "inputAddress": self.settings.input_address.as_str(),
            "scheduler": self.scheduler.is_some(),
            "consume": consume.to_json(),
            "send": send.to_json(),
        })
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("input_address", &self.settings.input_address)
            .field("scheduler", &self.scheduler.is_some())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusBuilder;
    use crate::config::RequestSettings;
    use crate::pipeline::{AsyncFnFilter, FnFilter};
    use crate::request::{RequestDescriptor, SagaInstance};
    use crate::scheduling::RequestTimeoutExpired;
    use crate::testing::{
        assert_message_type, assert_request_envelope, assert_timeout_for, FailingFilter, InMemoryTransport,
        RecordingFilter,
    };
    use futures::future::BoxFuture;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize)]
    struct OrderSubmitted {
        order_id: u32,
    }

    impl Message for OrderSubmitted {
        const MESSAGE_TYPE: &'static str = "orders:OrderSubmitted";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct ReserveStock {
        order_id: u32,
    }

    impl Message for ReserveStock {
        const MESSAGE_TYPE: &'static str = "inventory:ReserveStock";
    }

    #[derive(Debug, Default)]
    struct OrderSaga {
        correlation_id: Uuid,
        reservation: Option<Uuid>,
    }

    impl SagaInstance for OrderSaga {
        fn correlation_id(&self) -> Uuid {
            self.correlation_id
        }
    }

    fn address(path: &str) -> Address {
        Address::parse(&format!("loopback://local/{path}")).unwrap()
    }

    fn settings() -> BusSettings {
        BusSettings::new(address("orders-saga"))
    }

    #[test]
    fn test_build_requires_transport() {
        let err = BusBuilder::new(settings()).build().unwrap_err();
        assert_eq!(err.issues[0].key, "transport");
    }

    #[tokio::test]
    async fn test_send_runs_send_pipe() {
        let transport = Arc::new(InMemoryTransport::new());
        let bus = BusBuilder::new(settings())
            .transport(transport.clone())
            .send_filter(FnFilter::new("tenant", |ctx: &SendContext| {
                ctx.set_header("tenant", serde_json::json!("acme"));
                Ok(())
            }))
            .build()
            .unwrap();

        let message_id = bus.send(&address("inventory"), &ReserveStock { order_id: 1 }).await.unwrap();

        let sent = transport.sent_to(&address("inventory"));
        assert_eq!(sent[0].message_id, message_id);
        assert_eq!(sent[0].headers.get("tenant"), Some(&serde_json::json!("acme")));
        assert_eq!(sent[0].source_address, Some(address("orders-saga")));
        assert_message_type::<ReserveStock>(&sent[0]);
    }

    #[tokio::test]
    async fn test_publish_resolves_topic_once() {
        let transport = Arc::new(InMemoryTransport::new());
        let bus = BusBuilder::new(settings()).transport(transport.clone()).build().unwrap();

        bus.publish(&OrderSubmitted { order_id: 1 }).await.unwrap();
        bus.publish(&OrderSubmitted { order_id: 2 }).await.unwrap();

        let topic = Address::parse("loopback://local/orders/OrderSubmitted").unwrap();
        assert_eq!(transport.sent_to(&topic).len(), 2);
        assert_eq!(transport.resolve_count_for(&topic), 1);
    }

    #[tokio::test]
    async fn test_dispatch_runs_consume_pipe() {
        let transport = Arc::new(InMemoryTransport::new());
        let log = RecordingFilter::shared_log();
        let bus = BusBuilder::new(settings().with_in_process_scheduler(true))
            .transport(transport.clone())
            .consume_filter(RecordingFilter::new("consume", log.clone()))
            .consume_filter(FnFilter::new("check", |ctx: &ConsumeContext| {
                assert!(ctx.scheduler().is_some());
                assert!(ctx.envelope().is_some_and(|e| e.is::<OrderSubmitted>()));
                Ok(())
            }))
            .build()
            .unwrap();

        let envelope = Envelope::from_message(&OrderSubmitted { order_id: 3 }).unwrap();
        bus.dispatch(envelope).await.unwrap();

        assert_eq!(*log.lock(), vec!["consume"]);
    }

    #[tokio::test]
    async fn test_dispatch_failure_leaves_bus_usable() {
        let transport = Arc::new(InMemoryTransport::new());
        let failing = Arc::new(FailingFilter::new("handler failed"));
        let bus = BusBuilder::new(settings())
            .transport(transport)
            .consume_filter(failing.clone())
            .build()
            .unwrap();

        for _ in 0..3 {
            let envelope = Envelope::from_message(&OrderSubmitted { order_id: 3 }).unwrap();
            assert!(matches!(bus.dispatch(envelope).await, Err(BusError::Filter(_))));
        }
        assert_eq!(failing.call_count(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_dispatch_and_send() {
        let transport = Arc::new(InMemoryTransport::new());
        let bus = BusBuilder::new(settings()).transport(transport.clone()).build().unwrap();
        bus.shutdown("stopping");

        let envelope = Envelope::from_message(&OrderSubmitted { order_id: 3 }).unwrap();
        assert!(bus.dispatch(envelope).await.unwrap_err().is_cancelled());
        assert!(bus
            .send(&address("inventory"), &ReserveStock { order_id: 1 })
            .await
            .unwrap_err()
            .is_cancelled());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saga_request_times_out_through_in_process_scheduler() {
        let transport = Arc::new(InMemoryTransport::new());
        let saga = Arc::new(tokio::sync::Mutex::new(OrderSaga {
            correlation_id: Uuid::new_v4(),
            reservation: None,
        }));
        let request = Arc::new(
            RequestDescriptor::new(
                RequestSettings::new(address("inventory")).with_timeout(30.0),
                |saga: &mut OrderSaga, id| saga.reservation = id,
            )
            .with_request_id_accessor(|saga: &OrderSaga| saga.reservation),
        );

        let handler_saga = saga.clone();
        let handler_request = request.clone();
        let bus = BusBuilder::new(settings().with_in_process_scheduler(true))
            .transport(transport.clone())
            .consume_filter(AsyncFnFilter::new("reserve", move |ctx: &ConsumeContext| {
                let saga = handler_saga.clone();
                let request = handler_request.clone();
                Box::pin(async move {
                    if ctx.envelope().is_some_and(|e| e.is::<OrderSubmitted>()) {
                        let mut state = saga.lock().await;
                        request.send_request(ctx, &mut state, &ReserveStock { order_id: 9 }).await?;
                    }
                    Ok(())
                }) as BoxFuture<'_, Result<(), BusError>>
            }))
            .build()
            .unwrap();

        bus.dispatch(Envelope::from_message(&OrderSubmitted { order_id: 9 }).unwrap())
            .await
            .unwrap();

        let outbound = transport.sent_to(&address("inventory"));
        let request_id = assert_request_envelope(&outbound[0], &address("orders-saga"));
        assert_eq!(saga.lock().await.reservation, Some(request_id));

        tokio::time::advance(Duration::from_secs(31)).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        let returned = transport.sent_to(&address("orders-saga"));
        assert_eq!(returned.len(), 1);
        let expired: RequestTimeoutExpired = assert_timeout_for(&returned[0], request_id, Duration::from_secs(30));
        assert!(request.accepts(&*saga.lock().await, expired.request_id));
    }

    #[test]
    fn test_probe_describes_both_pipes() {
        let log = RecordingFilter::shared_log();
        let bus = BusBuilder::new(settings())
            .transport(Arc::new(InMemoryTransport::new()))
            .consume_filter(RecordingFilter::new("consume", log.clone()))
            .send_filter(RecordingFilter::new("send", log.clone()))
            .build()
            .unwrap();

        let probe = bus.probe();
        assert_eq!(probe["inputAddress"], "loopback://local/orders-saga");
        assert!(log.lock().is_empty());
    }
}
