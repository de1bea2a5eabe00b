//! Racing an operation against a cancellation token.

use super::CancellationToken;
use crate::errors::BusError;
use std::future::Future;

/// Runs `operation` until it completes or `token` is cancelled.
///
/// On cancellation the operation future is dropped, which runs any drop
/// guards it holds, and `BusError::Cancelled` is returned.
pub async fn run_until_cancelled<T, F>(token: &CancellationToken, operation: F) -> Result<T, BusError>
where
    F: Future<Output = Result<T, BusError>>,
{
    if token.is_cancelled() {
        return Err(cancelled_error(token));
    }

    tokio::select! {
        biased;
        result = operation => result,
        () = token.cancelled() => Err(cancelled_error(token)),
    }
}

fn cancelled_error(token: &CancellationToken) -> BusError {
    BusError::Cancelled(token.reason().unwrap_or_else(|| "cancelled".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_completes_normally() {
        let token = CancellationToken::new();
        let value = run_until_cancelled(&token, async { Ok::<_, BusError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_operation() {
        let token = CancellationToken::new();
        token.cancel("shutdown");

        let ran = std::sync::atomic::AtomicBool::new(false);
        let result = run_until_cancelled(&token, async {
            ran.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok::<_, BusError>(())
        })
        .await;

        assert!(matches!(result, Err(BusError::Cancelled(reason)) if reason == "shutdown"));
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_operation() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel("timeout");
        });

        let result = run_until_cancelled(&token, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, BusError>(())
        })
        .await;

        assert!(result.unwrap_err().is_cancelled());
    }
}
