//! # Pipebus
//!
//! A transport-agnostic message bus core.
//!
//! Pipebus provides the pieces a broker transport plugs into:
//!
//! - **Pipes and filters**: Composable, concurrently reusable processing chains
//! - **Resource scoping**: Per-invocation transport resources released exactly once
//! - **Request correlation**: Request ids persisted into saga state, with scheduled timeouts
//! - **Endpoint caching**: Single-flight resolution of send and publish endpoints
//! - **Cancellation**: Hierarchical tokens carried by every context
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipebus::prelude::*;
//!
//! let bus = BusBuilder::new(BusSettings::new(Address::parse("rabbitmq://localhost/orders")?))
//!     .transport(transport)
//!     .consume_filter(LogFilter::new("orders"))
//!     .consume_filter(OrderHandler::new())
//!     .build()?;
//!
//! bus.dispatch(envelope).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod bus;
pub mod cancellation;
pub mod config;
pub mod context;
pub mod endpoint;
pub mod errors;
pub mod message;
pub mod observability;
pub mod pipeline;
pub mod request;
pub mod scheduling;
pub mod testing;
pub mod transport;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bus::{BusBuilder, MessageBus};
    pub use crate::cancellation::{run_until_cancelled, CancellationToken};
    pub use crate::config::{BusSettings, RequestSettings};
    pub use crate::context::{Address, BaseContext, ConsumeContext, PayloadBag, PipeContext};
    pub use crate::endpoint::{
        PublishEndpointProvider, SendEndpoint, SendEndpointCache, SendEndpointProvider,
    };
    pub use crate::errors::{
        BusError, ConfigurationError, ConfigurationIssue, ResourceAcquisitionError, SendError,
    };
    pub use crate::message::{Envelope, Message, SendContext};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        AsyncFnFilter, ConditionalFilter, EmptyPipe, Filter, FilterSpecification, FnFilter,
        LogFilter, Pipe, PipeBuilder, ProbeContext, SplitFilter,
    };
    pub use crate::request::{RequestDescriptor, SagaInstance};
    pub use crate::scheduling::{
        InProcessScheduler, MessageScheduler, RequestTimeoutExpired, ScheduleSendExt,
    };
    pub use crate::transport::{
        ConnectionContext, ResourceScopedContext, ResourceScopedFilter, TransportResource,
    };
    pub use crate::utils::{generate_uuid, new_correlation_id, Timestamp};
}
