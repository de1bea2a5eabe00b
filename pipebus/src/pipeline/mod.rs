//! Pipe and filter composition.
//!
//! This module provides:
//! - The [`Filter`] and [`Pipe`] contracts
//! - Pipe composition from filter specifications, with validation
//! - Built-in filters (closures, predicates, context splitting, logging)
//! - Probing for diagnostics

mod builder;
mod filter;
mod filters;
mod pipe;
mod probe;

pub use builder::{FilterSpecification, PipeBuilder};
pub use filter::{Filter, Pipe};
pub use filters::{AsyncFnFilter, ConditionalFilter, FnFilter, LogFilter, SplitFilter};
pub use pipe::{EmptyPipe, FilterPipe};
pub use probe::{ProbeContext, ProbeScope};
