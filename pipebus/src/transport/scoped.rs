//! Resource-scoped contexts and the filter that creates them.

use super::{ConnectionContext, TransportResource};
use crate::cancellation::{run_until_cancelled, CancellationToken};
use crate::context::{PayloadBag, PipeContext};
use crate::errors::BusError;
use crate::pipeline::{Filter, Pipe, ProbeContext};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Owns an acquired resource and disposes it exactly once.
///
/// Disposal happens on [`release`](Self::release), or on drop if the owning
/// future is abandoned mid-flight.
pub struct ResourceGuard<R: TransportResource> {
    resource: Arc<R>,
    released: bool,
}

impl<R: TransportResource> ResourceGuard<R> {
    /// Takes ownership of a freshly acquired resource.
    #[must_use]
    pub fn new(resource: R) -> Self {
        Self {
            resource: Arc::new(resource),
            released: false,
        }
    }

    /// A shared handle for the scoped context.
    #[must_use]
    pub fn resource(&self) -> Arc<R> {
        Arc::clone(&self.resource)
    }

    /// Disposes the resource now.
    pub fn release(mut self) {
        self.dispose();
    }

    fn dispose(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        debug!(resource = %self.resource.describe(), "Releasing transport resource");
        self.resource.dispose();
    }
}

impl<R: TransportResource> Drop for ResourceGuard<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A context bound to one transport resource for one invocation.
pub struct ResourceScopedContext<C: ConnectionContext> {
    connection: C,
    resource: Arc<C::Resource>,
    cancellation: CancellationToken,
    payloads: PayloadBag,
}

impl<C: ConnectionContext> ResourceScopedContext<C> {
    /// Creates a scoped context whose cancellation follows the connection's.
    #[must_use]
    pub fn new(connection: C, resource: Arc<C::Resource>) -> Self {
        let cancellation = connection.cancellation().child_token();
        let payloads = connection.payloads().child();
        Self {
            connection,
            resource,
            cancellation,
            payloads,
        }
    }

    /// The connection-level context this scope was created from.
    #[must_use]
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// The transport resource.
    #[must_use]
    pub fn resource(&self) -> &C::Resource {
        &self.resource
    }
}

impl<C: ConnectionContext> PipeContext for ResourceScopedContext<C> {
    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn payloads(&self) -> &PayloadBag {
        &self.payloads
    }
}

impl<C: ConnectionContext> std::fmt::Debug for ResourceScopedContext<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceScopedContext")
            .field("connection", &self.connection.connection_name())
            .field("resource", &self.resource.describe())
            .finish()
    }
}

/// Runs an inner pipe against a freshly acquired transport resource.
///
/// The resource is acquired per invocation, never shared across concurrent
/// invocations, and released before control returns to the outer pipe on
/// success, on inner failure, and on cancellation.
pub struct ResourceScopedFilter<C: ConnectionContext> {
    resource_kind: String,
    pipe: Arc<dyn Pipe<ResourceScopedContext<C>>>,
}

impl<C: ConnectionContext> ResourceScopedFilter<C> {
    /// Creates a filter running `pipe` inside each acquired resource.
    #[must_use]
    pub fn new(resource_kind: impl Into<String>, pipe: Arc<dyn Pipe<ResourceScopedContext<C>>>) -> Self {
        Self {
            resource_kind: resource_kind.into(),
            pipe,
        }
    }
}

#[async_trait]
impl<C: ConnectionContext> Filter<C> for ResourceScopedFilter<C> {
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), BusError> {
        // Nothing to release if acquisition fails or is cancelled.
        let resource = run_until_cancelled(ctx.cancellation(), async {
            ctx.create_resource().await.map_err(BusError::from)
        })
        .await?;

        let guard = ResourceGuard::new(resource);
        let scoped = ResourceScopedContext::new(ctx.clone(), guard.resource());
        debug!(
            connection = %ctx.connection_name(),
            resource = %scoped.resource().describe(),
            "Running pipe in resource scope"
        );
        let result = run_until_cancelled(scoped.cancellation(), self.pipe.send(&scoped)).await;
        drop(scoped);
        guard.release();

        result?;
        next.send(ctx).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        let scope = probe.create_scope("resourceScope");
        scope.add("resource", self.resource_kind.clone());
        self.pipe.probe(scope.inner());
    }
}
