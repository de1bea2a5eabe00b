//! Pipe implementations.

use super::{Filter, Pipe, ProbeContext};
use crate::context::PipeContext;
use crate::errors::BusError;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

/// The terminal pipe: accepts any context and does nothing.
///
/// An empty pipe is the identity on its context.
pub struct EmptyPipe<C> {
    _context: PhantomData<fn(&C)>,
}

impl<C> EmptyPipe<C> {
    /// Creates an empty pipe.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _context: PhantomData,
        }
    }
}

impl<C> Default for EmptyPipe<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for EmptyPipe<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EmptyPipe")
    }
}

#[async_trait]
impl<C: PipeContext> Pipe<C> for EmptyPipe<C> {
    async fn send(&self, _ctx: &C) -> Result<(), BusError> {
        Ok(())
    }

    fn probe(&self, _probe: &mut ProbeContext) {}
}

/// One filter bound to the remainder of its pipe.
pub struct FilterPipe<C: PipeContext> {
    filter: Arc<dyn Filter<C>>,
    next: Arc<dyn Pipe<C>>,
}

impl<C: PipeContext + 'static> FilterPipe<C> {
    /// Binds `filter` in front of `next`.
    #[must_use]
    pub fn new(filter: Arc<dyn Filter<C>>, next: Arc<dyn Pipe<C>>) -> Self {
        Self { filter, next }
    }

    /// Composes filters into a pipe, first filter outermost.
    #[must_use]
    pub fn compose(filters: Vec<Arc<dyn Filter<C>>>) -> Arc<dyn Pipe<C>> {
        filters
            .into_iter()
            .rev()
            .fold(Arc::new(EmptyPipe::new()) as Arc<dyn Pipe<C>>, |next, filter| {
                Arc::new(Self::new(filter, next))
            })
    }
}

#[async_trait]
impl<C: PipeContext> Pipe<C> for FilterPipe<C> {
    async fn send(&self, ctx: &C) -> Result<(), BusError> {
        self.filter.send(ctx, self.next.as_ref()).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        self.filter.probe(probe);
        self.next.probe(probe);
    }
}
