//! Transport resource scoping.
//!
//! A connection produces short-lived resources (channels, sessions) that are
//! not safe to share between concurrent operations. The resource-scoped
//! filter acquires one per invocation, runs an inner pipe against it, and
//! releases it on every exit path.

mod resource;
mod scoped;

pub use resource::{ConnectionContext, TransportResource};
pub use scoped::{ResourceGuard, ResourceScopedContext, ResourceScopedFilter};
