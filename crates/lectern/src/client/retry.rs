//! Bounded exponential backoff for candidate source requests.

use std::future::Future;

use super::*;

/// How often and how patiently a request is retried.
///
/// Only errors for which [`LecternError::is_transient`] holds are retried. The wait before retry
/// `n` (counting from 1) is `base_delay * 2^(n - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts, including the first
  pub attempts:   u32,
  /// Wait before the first retry
  pub base_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self { Self { attempts: 3, base_delay: Duration::from_millis(500) } }
}

impl RetryPolicy {
  /// Creates a policy; zero attempts is treated as one.
  pub fn new(attempts: u32, base_delay: Duration) -> Self {
    Self { attempts: attempts.max(1), base_delay }
  }

  /// A policy that never retries.
  pub fn none() -> Self { Self::new(1, Duration::ZERO) }

  /// The wait after failed attempt number `attempt` (1-based).
  pub fn delay_after(&self, attempt: u32) -> Duration {
    self.base_delay.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
  }

  /// Runs `op` until it succeeds, fails permanently, or attempts run out.
  ///
  /// `label` only shows up in logs.
  pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>, {
    let mut attempt = 1;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(e) if e.is_transient() && attempt < self.attempts => {
          let delay = self.delay_after(attempt);
          warn!(
            "{label}: attempt {attempt}/{} failed ({e}), retrying in {}ms",
            self.attempts,
            delay.as_millis()
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        },
        Err(e) => {
          debug!("{label}: giving up after {attempt} attempt(s): {e}");
          return Err(e);
        },
      }
    }
  }
}
