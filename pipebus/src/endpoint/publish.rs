//! Publish endpoints: one topic address per message type.

use super::{SendEndpoint, SendEndpointProvider};
use crate::context::Address;
use crate::errors::BusError;
use std::sync::Arc;

/// Maps message types to topic addresses under a host and resolves them
/// through a shared endpoint provider (normally the bus-wide cache).
#[derive(Clone)]
pub struct PublishEndpointProvider {
    host: Address,
    endpoints: Arc<dyn SendEndpointProvider>,
}

impl PublishEndpointProvider {
    /// Creates a publish provider rooted at `host`.
    #[must_use]
    pub fn new(host: Address, endpoints: Arc<dyn SendEndpointProvider>) -> Self {
        Self { host, endpoints }
    }

    /// The topic address for a message type.
    ///
    /// Namespace separators (`:`) become path segments, so
    /// `orders:SubmitOrder` publishes to `<host>/orders/SubmitOrder`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the message type does not form a
    /// valid address.
    pub fn publish_address(&self, message_type: &str) -> Result<Address, BusError> {
        if message_type.trim().is_empty() {
            return Err(BusError::endpoint_resolution(self.host.as_str(), "message type is empty"));
        }
        let topic = self.host.join(&message_type.replace(':', "/"));
        Ok(Address::parse(topic.as_str())?)
    }

    /// Resolves the publish endpoint for a message type.
    pub async fn get_publish_endpoint(&self, message_type: &str) -> Result<Arc<dyn SendEndpoint>, BusError> {
        let address = self.publish_address(message_type)?;
        self.endpoints.get_send_endpoint(&address).await
    }
}

impl std::fmt::Debug for PublishEndpointProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishEndpointProvider")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::SendEndpointCache;
    use crate::testing::InMemoryTransport;

    fn provider(transport: Arc<InMemoryTransport>) -> PublishEndpointProvider {
        PublishEndpointProvider::new(
            Address::parse("loopback://local").unwrap(),
            Arc::new(SendEndpointCache::new(transport)),
        )
    }

    #[test]
    fn test_publish_address_from_message_type() {
        let publish = provider(Arc::new(InMemoryTransport::new()));
        assert_eq!(
            publish.publish_address("orders:SubmitOrder").unwrap().as_str(),
            "loopback://local/orders/SubmitOrder"
        );
    }

    #[test]
    fn test_publish_address_rejects_bad_type() {
        let publish = provider(Arc::new(InMemoryTransport::new()));
        assert!(publish.publish_address("").is_err());
        assert!(matches!(
            publish.publish_address("order submitted"),
            Err(BusError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_endpoints_are_cached() {
        let transport = Arc::new(InMemoryTransport::new());
        let publish = provider(transport.clone());

        let first = publish.get_publish_endpoint("orders:SubmitOrder").await.unwrap();
        let second = publish.get_publish_endpoint("orders:SubmitOrder").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.resolve_count(), 1);
    }
}
