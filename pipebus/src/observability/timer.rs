//! Timing of pipe invocations.

use crate::errors::BusError;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Times one pass through a pipe and logs its outcome.
#[derive(Debug)]
pub struct PipeTimer {
    pipe: String,
    started: Instant,
}

impl PipeTimer {
    /// Starts timing `pipe`.
    #[must_use]
    pub fn start(pipe: impl Into<String>) -> Self {
        Self {
            pipe: pipe.into(),
            started: Instant::now(),
        }
    }

    /// Time since the timer started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Logs the outcome with its duration and returns the duration in
    /// milliseconds. Failures are logged at warn level.
    pub fn record<T>(self, result: &Result<T, BusError>) -> f64 {
        let duration_ms = self.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(_) => debug!(pipe = %self.pipe, duration_ms, "Pipe completed"),
            Err(e) if e.is_cancelled() => debug!(pipe = %self.pipe, duration_ms, reason = %e, "Pipe cancelled"),
            Err(e) => warn!(pipe = %self.pipe, duration_ms, error = %e, "Pipe faulted"),
        }
        duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_returns_duration() {
        let timer = PipeTimer::start("consume");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.record(&Ok::<(), BusError>(())) >= 10.0);
    }

    #[test]
    fn test_record_failure() {
        let timer = PipeTimer::start("consume");
        let result: Result<(), BusError> = Err(BusError::Internal("boom".to_string()));
        assert!(timer.record(&result) >= 0.0);
    }
}
