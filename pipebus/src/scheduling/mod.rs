//! Delayed delivery of messages.
//!
//! Two routes exist: a remote scheduling service reached through a send
//! endpoint ([`ScheduleSendExt`], [`EndpointScheduler`]), and an ambient
//! [`MessageScheduler`] installed on the consume context.

mod in_process;
mod messages;
mod remote;
mod scheduler;

pub use in_process::InProcessScheduler;
pub use messages::{CancelScheduledMessage, RequestTimeoutExpired, ScheduleMessage};
pub use remote::{EndpointScheduler, ScheduleSendExt};
pub use scheduler::{MessageScheduler, ScheduledMessage};
