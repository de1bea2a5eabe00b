//! Request/response correlation for sagas.
//!
//! A saga sends a request through a [`RequestDescriptor`]. Each send mints a
//! fresh request id, stamps it on the outbound envelope together with the
//! saga's input address as response address, and persists it into the saga
//! state before the send completes. When the request has a timeout, a
//! [`RequestTimeoutExpired`](crate::scheduling::RequestTimeoutExpired)
//! message is scheduled back to the input address.

mod descriptor;
mod send_pipe;

pub use descriptor::{RequestDescriptor, SagaInstance};
pub use send_pipe::SendRequestPipe;
