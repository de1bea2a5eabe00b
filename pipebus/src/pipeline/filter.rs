//! Filter and pipe traits.
//!
//! A pipe is an ordered chain of filters over one context type. Each filter
//! receives the context and the remainder of the pipe, and decides whether to
//! forward, short-circuit, or fail.

use super::ProbeContext;
use crate::context::PipeContext;
use crate::errors::BusError;
use async_trait::async_trait;
use std::sync::Arc;

/// A composed, reusable chain of filters.
///
/// Pipes are immutable once built and may be invoked concurrently by any
/// number of contexts.
#[async_trait]
pub trait Pipe<C: PipeContext>: Send + Sync {
    /// Sends the context through the pipe.
    async fn send(&self, ctx: &C) -> Result<(), BusError>;

    /// Walks the pipe for diagnostics without executing any filter logic.
    fn probe(&self, probe: &mut ProbeContext);
}

/// A single processing stage.
///
/// Filters hold only construction-time configuration; per-invocation state
/// belongs in the context.
#[async_trait]
pub trait Filter<C: PipeContext>: Send + Sync {
    /// Processes the context.
    ///
    /// Call `next.send(ctx)` to continue. Returning without calling it
    /// short-circuits the remainder of the pipe; returning an error aborts
    /// this invocation only.
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), BusError>;

    /// Describes the filter for diagnostics. Must not cause side effects.
    fn probe(&self, probe: &mut ProbeContext);
}

#[async_trait]
impl<C: PipeContext, P: Pipe<C> + ?Sized> Pipe<C> for Arc<P> {
    async fn send(&self, ctx: &C) -> Result<(), BusError> {
        (**self).send(ctx).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        (**self).probe(probe);
    }
}

#[async_trait]
impl<C: PipeContext, F: Filter<C> + ?Sized> Filter<C> for Arc<F> {
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), BusError> {
        (**self).send(ctx, next).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        (**self).probe(probe);
    }
}
