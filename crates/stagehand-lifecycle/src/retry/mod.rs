//! Time-bounded retries with escalating visibility.
//!
//! Most transient failures (a database still booting) clear within a few
//! seconds, so failures inside the silent window are retried without any
//! output. Failures inside the loud window are logged before retrying, and
//! the first failure after the loud window ends the loop. Only elapsed wall
//! clock time governs termination; there is no attempt limit.

use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Tracing target for retry diagnostics.
const RETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::retry");

/// Default length of the silent window.
pub const DEFAULT_SILENT: Duration = Duration::from_millis(10_000);
/// Default point at which retrying stops.
pub const DEFAULT_LOUD: Duration = Duration::from_millis(12_000);
/// Default pause between attempts.
pub const DEFAULT_POLL: Duration = Duration::from_millis(100);

/// Thresholds for a single retry session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryWindow {
    silent: Duration,
    loud: Duration,
    poll: Duration,
}

impl Default for RetryWindow {
    fn default() -> Self {
        Self {
            silent: DEFAULT_SILENT,
            loud: DEFAULT_LOUD,
            poll: DEFAULT_POLL,
        }
    }
}

impl RetryWindow {
    /// Builds a window. `loud` is raised to `silent` when it is shorter.
    #[must_use]
    pub fn new(silent: Duration, loud: Duration, poll: Duration) -> Self {
        Self {
            silent,
            loud: loud.max(silent),
            poll,
        }
    }

    /// Builds a window from millisecond values.
    #[must_use]
    pub fn from_millis(silent: u64, loud: u64, poll: u64) -> Self {
        Self::new(
            Duration::from_millis(silent),
            Duration::from_millis(loud),
            Duration::from_millis(poll),
        )
    }

    /// Elapsed time below which failures are retried quietly.
    #[must_use]
    pub const fn silent(&self) -> Duration {
        self.silent
    }

    /// Elapsed time at which the last failure is returned.
    #[must_use]
    pub const fn loud(&self) -> Duration {
        self.loud
    }

    /// Pause between attempts.
    #[must_use]
    pub const fn poll(&self) -> Duration {
        self.poll
    }
}

/// Executes operations until they succeed or the window closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    window: RetryWindow,
}

impl RetryPolicy {
    /// Creates a policy for `window`.
    #[must_use]
    pub const fn new(window: RetryWindow) -> Self {
        Self { window }
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn window(&self) -> RetryWindow {
        self.window
    }

    /// Invokes `operation` until it succeeds.
    ///
    /// `label` names the operation in log events.
    ///
    /// # Errors
    ///
    /// Returns the most recent error once a failure is observed at or after
    /// the loud threshold.
    pub fn keep_trying<T, E, F>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let error = match operation() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            target: RETRY_TARGET,
                            operation = label,
                            attempt,
                            elapsed_ms = millis(started.elapsed()),
                            "operation succeeded after retrying"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let elapsed = started.elapsed();
            if elapsed >= self.window.loud {
                warn!(
                    target: RETRY_TARGET,
                    operation = label,
                    attempt,
                    elapsed_ms = millis(elapsed),
                    error = %error,
                    "giving up"
                );
                return Err(error);
            }
            if elapsed >= self.window.silent {
                warn!(
                    target: RETRY_TARGET,
                    operation = label,
                    attempt,
                    elapsed_ms = millis(elapsed),
                    error = %error,
                    "operation still failing; retrying"
                );
            }
            thread::sleep(self.window.poll);
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
