//! Bounded retry with a fixed delay for transient I/O.
//!
//! Ledger appends race with antivirus scanners, backup tools and other
//! processes holding the file.  Every writer operation funnels through
//! [`retry_io`] so the attempt budget lives in one place.

use std::future::Future;
use std::io;
use std::time::Duration;

use tracing::debug;

/// Attempt budget for one I/O operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.  Treated as 1 when 0.
    pub attempts: u32,

    /// Pause between a failed attempt and the next one.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 23,
            delay: Duration::from_millis(10),
        }
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up.
///
/// Returns the last error when every attempt failed.
pub async fn retry_io<T, F, Fut>(policy: RetryPolicy, operation: &str, mut op: F) -> io::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                debug!(
                    operation = %operation,
                    attempt,
                    attempts,
                    error = %e,
                    "transient I/O failure; retrying"
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
