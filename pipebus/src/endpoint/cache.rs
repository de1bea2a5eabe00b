//! Single-flight cache of resolved send endpoints.

use super::{SendEndpoint, SendEndpointProvider};
use crate::context::Address;
use crate::errors::BusError;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tracing::debug;

type Resolution = Shared<BoxFuture<'static, Result<Arc<dyn SendEndpoint>, BusError>>>;

#[derive(Clone)]
enum Slot {
    Resolved(Arc<dyn SendEndpoint>),
    Resolving(Resolution),
}

/// Caches endpoints resolved by an inner provider, keyed by exact address.
///
/// Concurrent callers for the same address await one in-flight resolution
/// and all receive its outcome. Successful resolutions are kept for the
/// lifetime of the cache. A failed resolution is dropped from the cache once
/// it completes, so only later callers retry. Distinct addresses resolve in
/// parallel.
pub struct SendEndpointCache<P: SendEndpointProvider + ?Sized + 'static> {
    provider: Arc<P>,
    endpoints: DashMap<Address, Slot>,
}

impl<P: SendEndpointProvider + ?Sized + 'static> SendEndpointCache<P> {
    /// Wraps `provider`.
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            endpoints: DashMap::new(),
        }
    }

    /// Number of addresses with a resolved endpoint.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Resolved(_)))
            .count()
    }

    /// Returns true if nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached endpoint.
    pub fn clear(&self) {
        self.endpoints.clear();
    }

    fn slot(&self, address: &Address) -> Slot {
        // The map guard is released at the end of this statement, before any await.
        self.endpoints
            .entry(address.clone())
            .or_insert_with(|| Slot::Resolving(self.resolve(address.clone())))
            .value()
            .clone()
    }

    fn resolve(&self, address: Address) -> Resolution {
        let provider = Arc::clone(&self.provider);
        async move {
            debug!(address = %address, "Resolving send endpoint");
            provider.get_send_endpoint(&address).await
        }
        .boxed()
        .shared()
    }

    fn settle(&self, address: &Address, resolution: &Resolution, result: &Result<Arc<dyn SendEndpoint>, BusError>) {
        let is_current = |slot: &Slot| matches!(slot, Slot::Resolving(current) if current.ptr_eq(resolution));
        match result {
            Ok(endpoint) => {
                if let Some(mut slot) = self.endpoints.get_mut(address) {
                    if is_current(slot.value()) {
                        *slot = Slot::Resolved(Arc::clone(endpoint));
                    }
                }
            }
            Err(e) => {
                if self.endpoints.remove_if(address, |_, slot| is_current(slot)).is_some() {
                    debug!(address = %address, error = %e, "Send endpoint resolution failed");
                }
            }
        }
    }
}

#[async_trait]
impl<P: SendEndpointProvider + ?Sized + 'static> SendEndpointProvider for SendEndpointCache<P> {
    async fn get_send_endpoint(&self, address: &Address) -> Result<Arc<dyn SendEndpoint>, BusError> {
        let resolution = match self.slot(address) {
            Slot::Resolved(endpoint) => return Ok(endpoint),
            Slot::Resolving(resolution) => resolution,
        };

        let result = resolution.clone().await;
        self.settle(address, &resolution, &result);
        result
    }
}

impl<P: SendEndpointProvider + ?Sized + 'static> std::fmt::Debug for SendEndpointCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendEndpointCache")
            .field("resolved", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::MockSendEndpointProvider;
    use crate::testing::{InMemorySendEndpoint, InMemoryTransport};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn address(path: &str) -> Address {
        Address::parse(&format!("loopback://local/{path}")).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolves_share_one_resolution() {
        let transport = Arc::new(InMemoryTransport::new().with_resolve_delay(Duration::from_millis(50)));
        let cache = Arc::new(SendEndpointCache::new(transport.clone()));
        let orders = address("orders");

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let cache = cache.clone();
                let orders = orders.clone();
                tokio::spawn(async move { cache.get_send_endpoint(&orders).await })
            })
            .collect();

        let endpoints: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(transport.resolve_count(), 1);
        assert!(endpoints.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_other_address_not_blocked() {
        let transport = Arc::new(InMemoryTransport::new().with_resolve_delay(Duration::from_millis(200)));
        let cache = Arc::new(SendEndpointCache::new(transport.clone()));

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_send_endpoint(&address("a")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let started = std::time::Instant::now();
        let other = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get_send_endpoint(&address("b")).await }
        });
        other.await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_millis(400));

        slow.await.unwrap().unwrap();
        assert_eq!(transport.resolve_count_for(&address("a")), 1);
        assert_eq!(transport.resolve_count_for(&address("b")), 1);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let mut provider = MockSendEndpointProvider::new();
        let mut seq = mockall::Sequence::new();
        provider
            .expect_get_send_endpoint()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|address| Err(BusError::endpoint_resolution(address.as_str(), "broker down")));
        provider
            .expect_get_send_endpoint()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|address| {
                let endpoint: Arc<dyn SendEndpoint> = Arc::new(InMemorySendEndpoint::new(address.clone()));
                Ok(endpoint)
            });

        let cache = SendEndpointCache::new(Arc::new(provider));
        let orders = address("orders");

        let first = cache.get_send_endpoint(&orders).await;
        assert!(matches!(first, Err(BusError::EndpointResolution { .. })));
        assert!(cache.is_empty());

        let second = cache.get_send_endpoint(&orders).await.unwrap();
        assert_eq!(second.address(), &orders);

        // Third call is served from the cache; the mock would panic otherwise.
        cache.get_send_endpoint(&orders).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_failed_resolution() {
        let transport = Arc::new(InMemoryTransport::new().with_resolve_delay(Duration::from_millis(50)));
        let unreachable = address("unreachable");
        transport.fail_resolution(unreachable.clone());
        let cache = Arc::new(SendEndpointCache::new(transport.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let unreachable = unreachable.clone();
                tokio::spawn(async move { cache.get_send_endpoint(&unreachable).await })
            })
            .collect();

        for joined in futures::future::join_all(handles).await {
            assert!(matches!(joined.unwrap(), Err(BusError::EndpointResolution { .. })));
        }
        assert_eq!(transport.resolve_count_for(&unreachable), 1);

        // A later caller retries.
        assert!(cache.get_send_endpoint(&unreachable).await.is_err());
        assert_eq!(transport.resolve_count_for(&unreachable), 2);
    }

    #[tokio::test]
    async fn test_failed_addresses_leave_no_slot() {
        let transport = Arc::new(InMemoryTransport::new());
        let cache = SendEndpointCache::new(transport.clone());

        for n in 0..20 {
            let unreachable = address(&format!("gone-{n}"));
            transport.fail_resolution(unreachable.clone());
            assert!(cache.get_send_endpoint(&unreachable).await.is_err());
        }
        cache.get_send_endpoint(&address("orders")).await.unwrap();

        assert_eq!(cache.endpoints.len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_exact_address_keys() {
        let transport = Arc::new(InMemoryTransport::new());
        let cache = SendEndpointCache::new(transport.clone());

        cache.get_send_endpoint(&address("orders")).await.unwrap();
        cache.get_send_endpoint(&address("orders?durable=true")).await.unwrap();
        cache.get_send_endpoint(&address("orders")).await.unwrap();

        assert_eq!(transport.resolve_count(), 2);
    }
}
