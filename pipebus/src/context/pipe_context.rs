//! The context contract shared by every pipe.

use super::PayloadBag;
use crate::cancellation::CancellationToken;

/// Trait implemented by every context that flows through a pipe.
///
/// A context is owned by whoever currently holds it and is immutable by
/// convention; ambient state goes through the payload bag, which is safe to
/// mutate through a shared reference.
pub trait PipeContext: Send + Sync {
    /// The cancellation signal for this invocation.
    fn cancellation(&self) -> &CancellationToken;

    /// The ambient payloads for this invocation.
    fn payloads(&self) -> &PayloadBag;

    /// Returns true if the invocation has been cancelled.
    fn is_cancelled(&self) -> bool {
        self.cancellation().is_cancelled()
    }
}

/// A plain context carrying only a cancellation signal and payloads.
#[derive(Debug, Clone, Default)]
pub struct BaseContext {
    cancellation: CancellationToken,
    payloads: PayloadBag,
}

impl BaseContext {
    /// Creates a new root context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context bound to an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            payloads: PayloadBag::new(),
        }
    }

    /// Derives a child context: child cancellation token, child payload bag.
    #[must_use]
    pub fn derive<C: PipeContext + ?Sized>(parent: &C) -> Self {
        Self {
            cancellation: parent.cancellation().child_token(),
            payloads: parent.payloads().child(),
        }
    }
}

impl PipeContext for BaseContext {
    fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn payloads(&self) -> &PayloadBag {
        &self.payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_inherits_cancellation_and_payloads() {
        let parent = BaseContext::new();
        parent.payloads().insert(5_u32);

        let child = BaseContext::derive(&parent);
        assert_eq!(*child.payloads().try_get::<u32>().unwrap(), 5);

        parent.cancellation().cancel("shutdown");
        assert!(child.is_cancelled());
    }
}
