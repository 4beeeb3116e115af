use std::thread;
use std::time::Duration;

use beacon_types::Record;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;
use crate::ledger::Ledger;

/// Jittered exponential backoff for operations that fail with a retryable
/// [`LedgerError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_pct: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay_ms: u64, max_delay_ms: u64, jitter_pct: f64) -> Self {
        let base_delay_ms = base_delay_ms.max(1);
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
        }
    }

    /// A single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self::new(1, 1, 1, 0.0)
    }

    /// Policy with every field pulled back into range. Deserialized
    /// policies bypass [`RetryPolicy::new`].
    pub fn clamped(&self) -> Self {
        Self::new(
            self.max_attempts,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_pct,
        )
    }

    fn next_delay(&self, attempt: usize) -> Duration {
        let exp = 2_u64.saturating_pow(attempt as u32);
        let delay = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        if self.jitter_pct <= 0.0 {
            return Duration::from_millis(delay);
        }
        let spread = (delay as f64 * self.jitter_pct) as i64;
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis(delay.saturating_add_signed(delta))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The closure receives the zero-based attempt.
    pub fn retry<T, F>(&self, mut op: F) -> Result<T, LedgerError>
    where
        F: FnMut(usize) -> Result<T, LedgerError>,
    {
        let policy = self.clamped();
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(val) => return Ok(val),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    attempt += 1;
                    if attempt >= policy.max_attempts {
                        return Err(err);
                    }
                    let delay = policy.next_delay(attempt - 1);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                    thread::sleep(delay);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 10, 500, 0.2)
    }
}

/// Append, retrying chain conflicts under `policy`.
pub fn append_with_retry(ledger: &Ledger, policy: &RetryPolicy) -> Result<Record, LedgerError> {
    policy.retry(|_| ledger.append())
}
