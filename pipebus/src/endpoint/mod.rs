//! Send and publish endpoints.
//!
//! Transports implement [`SendEndpointProvider`]; the bus wraps the provider
//! in a [`SendEndpointCache`] so each address is resolved once.

mod cache;
mod provider;
mod publish;

pub use cache::SendEndpointCache;
pub use provider::{SendEndpoint, SendEndpointProvider};
pub use publish::PublishEndpointProvider;

#[cfg(test)]
pub use provider::MockSendEndpointProvider;
