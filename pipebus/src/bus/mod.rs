//! Bus assembly.

mod builder;
mod message_bus;

pub use builder::BusBuilder;
pub use message_bus::MessageBus;
