//! Resending requests the server never got to answer.
//!
//! A request is sent again when it failed in transport (connect error,
//! timeout) or the answer is a gateway status (502, 503, 504). Every other
//! answer, success or rejection, goes straight back to the caller. Check-in
//! and overrides are idempotent on the server, so a resend after an
//! ambiguous failure cannot double-apply anything.
//!
//! Attempts stop when `max_retries` is used up or when the next pause would
//! carry the call past `budget`. The last outcome is then returned and the
//! reconciler decides whether the intent goes to the offline queue.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::ClientConfig;

/// Resends after the first attempt, unless the budget runs out first.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// First pause; doubles on every resend.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);

/// How a [`RollcallClient`](crate::RollcallClient) resends requests the
/// server did not answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Wall-clock limit for one call across all attempts.
    pub budget: Duration,
}

impl RetryPolicy {
    /// Default schedule, bounded by the configured request timeout.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            budget: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Send once and report whatever happened.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            budget: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `send` until it yields an answer worth returning.
    pub(crate) async fn send<F, Fut>(
        &self,
        endpoint: &str,
        send: F,
    ) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            let outcome = send().await;
            let unanswered = match &outcome {
                Ok(resp) if is_gateway_status(resp.status()) => Some(resp.status().to_string()),
                Err(e) if e.is_connect() || e.is_timeout() => Some(e.to_string()),
                _ => None,
            };
            let Some(reason) = unanswered else {
                return outcome;
            };
            let delay = self.delay(attempt);
            if attempt >= self.max_retries || started.elapsed() + delay > self.budget {
                return outcome;
            }
            attempt += 1;
            tracing::warn!(
                endpoint,
                attempt,
                max_retries = self.max_retries,
                "server did not answer ({reason}), resending in {delay:?}"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn is_gateway_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 502..=504)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            budget: Duration::from_secs(5),
        }
    }

    async fn refused(calls: &AtomicU32) -> Result<reqwest::Response, reqwest::Error> {
        calls.fetch_add(1, Ordering::SeqCst);
        // Closed port: connection refused.
        reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap()
            .get("http://127.0.0.1:1/")
            .send()
            .await
    }

    #[tokio::test]
    async fn refused_connection_uses_every_retry() {
        let calls = AtomicU32::new(0);
        let result = fast(3).send("GET /", || refused(&calls)).await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn no_retry_policy_sends_once() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::none().send("GET /", || refused(&calls)).await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_cuts_retries_short() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
            budget: Duration::from_millis(250),
        };
        let result = policy.send("GET /", || refused(&calls)).await;

        assert!(result.is_err());
        // Pauses of 100ms and 200ms do not both fit in 250ms.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn budget_follows_configured_timeout() {
        let mut config = ClientConfig::local("http://localhost:8080", "q.db").unwrap();
        config.timeout_secs = 30;
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.budget, Duration::from_secs(30));
        assert_eq!(policy.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn only_gateway_statuses_are_resent() {
        for code in [502, 503, 504] {
            assert!(is_gateway_status(reqwest::StatusCode::from_u16(code).unwrap()));
        }
        for code in [200, 400, 401, 404, 500] {
            assert!(!is_gateway_status(reqwest::StatusCode::from_u16(code).unwrap()));
        }
    }
}
