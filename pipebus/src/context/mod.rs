//! Contexts carried through pipes.
//!
//! This module provides:
//! - The [`PipeContext`] contract every pipe context implements
//! - A typed payload bag for ambient capabilities
//! - Validated endpoint addresses
//! - The consume context handed to inbound pipes

mod address;
mod consume;
mod payload;
mod pipe_context;

pub use address::Address;
pub use consume::ConsumeContext;
pub use payload::PayloadBag;
pub use pipe_context::{BaseContext, PipeContext};
