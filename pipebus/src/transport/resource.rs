//! Connection and resource contracts implemented by transports.

use crate::context::PipeContext;
use crate::errors::ResourceAcquisitionError;
use async_trait::async_trait;

/// A per-operation transport resource such as a channel or session.
pub trait TransportResource: Send + Sync + 'static {
    /// A short label for logs (e.g. "channel 7").
    fn describe(&self) -> String;

    /// Releases the resource. Called exactly once per acquired resource.
    fn dispose(&self);
}

/// A connection-level context able to create transport resources.
#[async_trait]
pub trait ConnectionContext: PipeContext + Clone + 'static {
    /// The resource type created by this connection.
    type Resource: TransportResource;

    /// A label identifying the connection (usually its broker address).
    fn connection_name(&self) -> String;

    /// Opens a new resource on the connection.
    async fn create_resource(&self) -> Result<Self::Resource, ResourceAcquisitionError>;
}
