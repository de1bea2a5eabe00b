//! Built-in filters.

use super::{Filter, Pipe, ProbeContext};
use crate::context::PipeContext;
use crate::errors::BusError;
use crate::observability::PipeTimer;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// A filter that runs a synchronous closure and then forwards.
pub struct FnFilter<C, F>
where
    F: Fn(&C) -> Result<(), BusError> + Send + Sync,
{
    name: String,
    func: F,
    _context: PhantomData<fn(&C)>,
}

impl<C, F> FnFilter<C, F>
where
    F: Fn(&C) -> Result<(), BusError> + Send + Sync,
{
    /// Creates a new closure filter.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _context: PhantomData,
        }
    }
}

impl<C, F> Debug for FnFilter<C, F>
where
    F: Fn(&C) -> Result<(), BusError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFilter").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<C, F> Filter<C> for FnFilter<C, F>
where
    C: PipeContext,
    F: Fn(&C) -> Result<(), BusError> + Send + Sync,
{
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), BusError> {
        (self.func)(ctx)?;
        next.send(ctx).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.create_scope(self.name.clone());
    }
}

/// A filter that awaits an async closure and then forwards.
pub struct AsyncFnFilter<C, F>
where
    F: for<'a> Fn(&'a C) -> BoxFuture<'a, Result<(), BusError>> + Send + Sync,
{
    name: String,
    func: F,
    _context: PhantomData<fn(&C)>,
}

impl<C, F> AsyncFnFilter<C, F>
where
    F: for<'a> Fn(&'a C) -> BoxFuture<'a, Result<(), BusError>> + Send + Sync,
{
    /// Creates a new async closure filter.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _context: PhantomData,
        }
    }
}

impl<C, F> Debug for AsyncFnFilter<C, F>
where
    F: for<'a> Fn(&'a C) -> BoxFuture<'a, Result<(), BusError>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnFilter").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<C, F> Filter<C> for AsyncFnFilter<C, F>
where
    C: PipeContext,
    F: for<'a> Fn(&'a C) -> BoxFuture<'a, Result<(), BusError>> + Send + Sync,
{
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), BusError> {
        (self.func)(ctx).await?;
        next.send(ctx).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.create_scope(self.name.clone()).add("async", true);
    }
}

/// Forwards only when the predicate holds; otherwise short-circuits.
pub struct ConditionalFilter<C, P>
where
    P: Fn(&C) -> bool + Send + Sync,
{
    name: String,
    predicate: P,
    _context: PhantomData<fn(&C)>,
}

impl<C, P> ConditionalFilter<C, P>
where
    P: Fn(&C) -> bool + Send + Sync,
{
    /// Creates a new conditional filter.
    pub fn new(name: impl Into<String>, predicate: P) -> Self {
        Self {
            name: name.into(),
            predicate,
            _context: PhantomData,
        }
    }
}

#[async_trait]
impl<C, P> Filter<C> for ConditionalFilter<C, P>
where
    C: PipeContext,
    P: Fn(&C) -> bool + Send + Sync,
{
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), BusError> {
        if (self.predicate)(ctx) {
            next.send(ctx).await
        } else {
            debug!(filter = %self.name, "Predicate rejected context, short-circuiting");
            Ok(())
        }
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.create_scope("conditional").add("name", self.name.clone());
    }
}

/// Derives a context of another type, sends it through an inner pipe, then
/// continues the outer pipe with the original context.
pub struct SplitFilter<C, D, F>
where
    D: PipeContext,
    F: Fn(&C) -> D + Send + Sync,
{
    split: F,
    pipe: Arc<dyn Pipe<D>>,
    _context: PhantomData<fn(&C)>,
}

impl<C, D, F> SplitFilter<C, D, F>
where
    D: PipeContext,
    F: Fn(&C) -> D + Send + Sync,
{
    /// Creates a split filter over `pipe`.
    pub fn new(split: F, pipe: Arc<dyn Pipe<D>>) -> Self {
        Self {
            split,
            pipe,
            _context: PhantomData,
        }
    }
}

#[async_trait]
impl<C, D, F> Filter<C> for SplitFilter<C, D, F>
where
    C: PipeContext,
    D: PipeContext,
    F: Fn(&C) -> D + Send + Sync,
{
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), BusError> {
        let derived = (self.split)(ctx);
        self.pipe.send(&derived).await?;
        next.send(ctx).await
    }

    fn probe(&self, probe: &mut ProbeContext) {
        let scope = probe.create_scope("split");
        scope.add("context", std::any::type_name::<D>());
        self.pipe.probe(scope.inner());
    }
}

/// Logs entry, exit and duration of the rest of the pipe.
#[derive(Debug, Clone)]
pub struct LogFilter {
    label: String,
}

impl LogFilter {
    /// Creates a new log filter.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[async_trait]
impl<C: PipeContext> Filter<C> for LogFilter {
    async fn send(&self, ctx: &C, next: &dyn Pipe<C>) -> Result<(), BusError> {
        let timer = PipeTimer::start(self.label.clone());
        debug!(pipe = %self.label, "Entering pipe");

        let result = next.send(ctx).await;
        timer.record(&result);
        result
    }

    fn probe(&self, probe: &mut ProbeContext) {
        probe.create_scope("log").add("label", self.label.clone());
    }
}
