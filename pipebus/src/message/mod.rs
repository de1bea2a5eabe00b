//! Messages and the outbound send context.

mod envelope;
mod send_context;

pub use envelope::{Envelope, Message};
pub use send_context::SendContext;
