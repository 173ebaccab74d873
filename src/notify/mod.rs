//! Outbound notifications.
//!
//! [`Notifier`] is the seam the run controller talks to; [`TelegramNotifier`]
//! is the production implementation. Regular alerts are sent once, while
//! [`send_with_retry`] applies a bounded retry policy for messages that must
//! not be lost, such as the shutdown notice.

pub mod telegram;

pub use telegram::TelegramNotifier;

use crate::error::SendError;
use std::future::Future;
use std::time::Duration;

/// Text sent when the monitor is stopped by a signal.
pub const SHUTDOWN_MESSAGE: &str = "Temp monitor stopped.";

/// Trait for delivering a text message.
pub trait Notifier {
    /// Send `text`. Success means the remote API accepted it.
    fn send(&self, text: &str) -> impl Future<Output = Result<(), SendError>> + Send;
}

/// Bounded retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Upper bound for a single attempt.
    pub attempt_timeout: Duration,
    /// Delay before the second attempt; doubles afterwards.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Send `text`, retrying up to `policy.attempts` times.
///
/// Each attempt is cut off after `policy.attempt_timeout`. Returns the last
/// error once all attempts failed.
pub async fn send_with_retry<N>(notifier: &N, text: &str, policy: RetryPolicy) -> Result<(), SendError>
where
    N: Notifier + Sync,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, notifier.send(text)).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(policy.attempt_timeout)),
        };

        match result {
            Ok(()) => return Ok(()),
            Err(e) if attempt >= attempts => {
                tracing::error!(attempts, error = %e, "Notification failed after all retries");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.backoff_after(attempt);
                tracing::warn!(
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Notification attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
