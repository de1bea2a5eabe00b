//! Builder for [`MessageBus`].

use super::MessageBus;
use crate::cancellation::CancellationToken;
use crate::config::BusSettings;
use crate::context::ConsumeContext;
use crate::endpoint::{PublishEndpointProvider, SendEndpointCache, SendEndpointProvider};
use crate::errors::ConfigurationError;
use crate::message::SendContext;
use crate::pipeline::{Filter, FilterSpecification, PipeBuilder};
use crate::scheduling::{EndpointScheduler, InProcessScheduler, MessageScheduler};
use std::sync::Arc;
use tracing::info;

/// Assembles a [`MessageBus`] from settings, a transport and pipes.
pub struct BusBuilder {
    settings: BusSettings,
    transport: Option<Arc<dyn SendEndpointProvider>>,
    consume: PipeBuilder<ConsumeContext>,
    send: PipeBuilder<SendContext>,
    cancellation: CancellationToken,
}

impl BusBuilder {
    /// Starts a builder for the given settings.
    #[must_use]
    pub fn new(settings: BusSettings) -> Self {
        Self {
            settings,
            transport: None,
            consume: PipeBuilder::new("consume"),
            send: PipeBuilder::new("send"),
            cancellation: CancellationToken::new(),
        }
    }

    /// Sets the transport's endpoint provider.
    #[must_use]
    pub fn transport(mut self, provider: Arc<dyn SendEndpointProvider>) -> Self {
        self.transport = Some(provider);
        self
    }

    /// Appends a filter to the consume pipe.
    #[must_use]
    pub fn consume_filter(mut self, filter: impl Filter<ConsumeContext> + 'static) -> Self {
        self.consume = self.consume.filter(filter);
        self
    }

    /// Appends a specification to the consume pipe.
    #[must_use]
    pub fn consume_specification(mut self, spec: impl FilterSpecification<ConsumeContext> + 'static) -> Self {
        self.consume = self.consume.specification(spec);
        self
    }

    /// Appends a filter to the send pipe.
    #[must_use]
    pub fn send_filter(mut self, filter: impl Filter<SendContext> + 'static) -> Self {
        self.send = self.send.filter(filter);
        self
    }

    /// Uses `token` as the bus cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Validates everything and builds the bus.
    ///
    /// The transport provider is wrapped in a [`SendEndpointCache`] shared by
    /// sends, publishes and the ambient scheduler.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the settings are invalid, no transport
    /// was set, or a pipe fails validation.
    pub fn build(self) -> Result<MessageBus, ConfigurationError> {
        self.settings.validate()?;
        let transport = self.transport.ok_or_else(|| {
            ConfigurationError::new("A transport must be configured").with_issue("transport", "not set")
        })?;

        let endpoints: Arc<dyn SendEndpointProvider> = Arc::new(SendEndpointCache::new(transport));
        let publish = PublishEndpointProvider::new(self.settings.publish_host(), Arc::clone(&endpoints));

        let scheduler: Option<Arc<dyn MessageScheduler>> = if self.settings.in_process_scheduler {
            Some(Arc::new(InProcessScheduler::new(Arc::clone(&endpoints))))
        } else {
            self.settings
                .scheduler_address
                .clone()
                .map(|address| Arc::new(EndpointScheduler::new(address, Arc::clone(&endpoints))) as Arc<dyn MessageScheduler>)
        };

        let consume_pipe = self.consume.build()?;
        let send_pipe = self.send.build()?;

        info!(
            input_address = %self.settings.input_address,
            scheduler = scheduler.is_some(),
            "Message bus built"
        );
        Ok(MessageBus::new(
            self.settings,
            endpoints,
            publish,
            scheduler,
            consume_pipe,
            send_pipe,
            self.cancellation,
        ))
    }
}

impl std::fmt::Debug for BusBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusBuilder")
            .field("settings", &self.settings)
            .field("has_transport", &self.transport.is_some())
            .field("consume_filters", &self.consume.len())
            .field("send_filters", &self.send.len())
            .finish()
    }
}
