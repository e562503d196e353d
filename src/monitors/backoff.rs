use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::trace;

/// Exponential delay between recovery attempts of one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    /// `min(base * 2^(attempt - 1), cap)` for attempts starting at 1
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);

        2u32.checked_pow(exponent)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryAttempt {
    pub attempt_count: u32,
    pub last_attempt_at: DateTime<Utc>,
    pub next_eligible_at: DateTime<Utc>,
}

/// A recovery attempt that was allowed to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub attempt: u32,

    /// Time until the next attempt becomes eligible
    pub retry_in: Duration,
}

/// Tracks recovery attempts per source
#[derive(Debug, Default)]
pub struct BackoffTracker {
    policy: BackoffPolicy,
    attempts: Mutex<HashMap<String, RecoveryAttempt>>,
}

impl BackoffTracker {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Start a new attempt unless the source is still backing off
    ///
    /// A throttled call changes nothing.
    pub async fn try_begin(&self, source_id: &str, now: DateTime<Utc>) -> Option<Admission> {
        let mut attempts = self.attempts.lock().await;

        if let Some(entry) = attempts.get(source_id) {
            if now < entry.next_eligible_at {
                trace!(
                    "recovery of {source_id} throttled until {}",
                    entry.next_eligible_at
                );
                return None;
            }
        }

        let attempt = attempts
            .get(source_id)
            .map_or(1, |entry| entry.attempt_count.saturating_add(1));
        let retry_in = self.policy.delay(attempt);
        let next_eligible_at = TimeDelta::from_std(retry_in)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        attempts.insert(
            source_id.to_string(),
            RecoveryAttempt {
                attempt_count: attempt,
                last_attempt_at: now,
                next_eligible_at,
            },
        );

        Some(Admission { attempt, retry_in })
    }

    /// Forget the attempts of a source after a successful restart
    pub async fn clear(&self, source_id: &str) {
        self.attempts.lock().await.remove(source_id);
    }

    pub async fn get(&self, source_id: &str) -> Option<RecoveryAttempt> {
        self.attempts.lock().await.get(source_id).cloned()
    }
}
