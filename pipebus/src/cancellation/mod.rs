//! Cooperative cancellation.
//!
//! Every context carries a [`CancellationToken`]. Derived contexts carry a
//! child token, so cancelling an outer operation cancels everything nested
//! inside it.

mod scope;
mod token;

pub use scope::run_until_cancelled;
pub use token::CancellationToken;
