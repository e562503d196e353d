use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::SourceStatus;
use crate::gateway::{Fingerprint, GatewayStatus};

/// Thresholds used to classify a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Consecutive failures before a source is confirmed offline
    pub failure_threshold: u32,

    /// An unchanged fingerprint older than this means frozen
    pub frozen_threshold: Duration,

    /// Without a fresh fingerprint, no progress for this long means frozen
    pub frozen_fallback_threshold: Duration,

    /// Upper bound for a single gateway call
    pub call_timeout: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            frozen_threshold: Duration::from_secs(45),
            frozen_fallback_threshold: Duration::from_secs(60),
            call_timeout: Duration::from_secs(10),
        }
    }
}

/// Health record of a single source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: SourceStatus,
    pub last_checked_at: DateTime<Utc>,
    pub consecutive_failures: u32,

    /// Last time the stream was seen making progress
    pub last_success_at: Option<DateTime<Utc>>,

    pub last_fingerprint: Option<Fingerprint>,
}

/// Outcome of the fingerprint probe of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintProbe {
    Captured(Fingerprint),

    /// The gateway supports fingerprints but the capture failed
    Failed,

    /// The gateway has no fingerprint capability
    Unsupported,

    /// No capture was attempted (failed check)
    NotAttempted,
}

/// What a single check observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Status reported by the gateway, `None` when it could not be reached
    pub gateway: Option<GatewayStatus>,

    pub fingerprint: FingerprintProbe,
}

impl Observation {
    pub fn unreachable() -> Self {
        Self {
            gateway: None,
            fingerprint: FingerprintProbe::NotAttempted,
        }
    }

    pub fn reported(status: GatewayStatus, fingerprint: FingerprintProbe) -> Self {
        Self {
            gateway: Some(status),
            fingerprint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthClass {
    /// Success-class check, nothing to report
    Healthy,

    /// First success after a confirmed failure
    BackOnline,

    /// The stream is up but not making progress
    Frozen { entered: bool },

    /// Failure below the threshold, recorded status unchanged
    Absorbed,

    /// Failure at or above the threshold
    ConfirmedOffline { escalated: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthEvaluation {
    pub previous_status: SourceStatus,
    pub snapshot: HealthSnapshot,
    pub class: HealthClass,

    /// First success after a confirmed failure, also set when the
    /// same check finds the stream frozen
    pub back_online: bool,
}

impl HealthEvaluation {
    pub fn status_changed(&self) -> bool {
        self.previous_status != self.snapshot.status
    }

    pub fn needs_recovery(&self) -> bool {
        matches!(
            self.class,
            HealthClass::ConfirmedOffline { .. } | HealthClass::Frozen { .. }
        )
    }

    /// Whether an offline/online/frozen notice should be emitted
    pub fn notify(&self) -> bool {
        self.back_online
            || matches!(
                self.class,
                HealthClass::Frozen { entered: true }
                    | HealthClass::ConfirmedOffline { escalated: true }
            )
    }
}

/// Classify one check against the previous record of the source
///
/// `baseline` is the status assumed when there is no previous record.
pub fn evaluate(
    prior: Option<&HealthSnapshot>,
    baseline: SourceStatus,
    observation: &Observation,
    now: DateTime<Utc>,
    policy: &HealthPolicy,
) -> HealthEvaluation {
    let previous_status = prior.map(|p| p.status).unwrap_or(baseline);
    let prior_failures = prior.map(|p| p.consecutive_failures).unwrap_or_default();
    let prior_fingerprint = prior.and_then(|p| p.last_fingerprint.clone());
    let prior_success = prior.and_then(|p| p.last_success_at);

    let Some(gateway) = observation.gateway.filter(GatewayStatus::is_success) else {
        let consecutive_failures = prior_failures.saturating_add(1);

        let (status, class) = if consecutive_failures < policy.failure_threshold {
            (previous_status, HealthClass::Absorbed)
        } else {
            let status = match observation.gateway {
                Some(GatewayStatus::Error) => SourceStatus::Error,
                _ => SourceStatus::Offline,
            };
            let escalated = consecutive_failures == policy.failure_threshold;
            (status, HealthClass::ConfirmedOffline { escalated })
        };

        return HealthEvaluation {
            previous_status,
            snapshot: HealthSnapshot {
                status,
                last_checked_at: now,
                consecutive_failures,
                last_success_at: prior_success,
                last_fingerprint: prior_fingerprint,
            },
            class,
            back_online: false,
        };
    };

    let stalled_for = |limit: Duration| {
        prior_success
            .and_then(|since| (now - since).to_std().ok())
            .is_some_and(|elapsed| elapsed > limit)
    };

    // frozen detection needs a reference frame from an earlier check
    let frozen = gateway == GatewayStatus::Ready
        && prior_fingerprint.is_some()
        && match &observation.fingerprint {
            FingerprintProbe::Captured(fingerprint) => {
                prior_fingerprint.as_ref() == Some(fingerprint)
                    && stalled_for(policy.frozen_threshold)
            }
            FingerprintProbe::Failed | FingerprintProbe::Unsupported => {
                stalled_for(policy.frozen_fallback_threshold)
            }
            FingerprintProbe::NotAttempted => false,
        };

    let (last_fingerprint, last_success_at) = match &observation.fingerprint {
        FingerprintProbe::Captured(fingerprint) if prior_fingerprint.as_ref() != Some(fingerprint) => {
            (Some(fingerprint.clone()), now)
        }
        FingerprintProbe::Captured(fingerprint) => {
            (Some(fingerprint.clone()), prior_success.unwrap_or(now))
        }
        _ => (prior_fingerprint, prior_success.unwrap_or(now)),
    };

    let back_online = matches!(previous_status, SourceStatus::Offline | SourceStatus::Error)
        && prior_failures >= policy.failure_threshold;

    let (status, class) = if frozen {
        let entered = previous_status != SourceStatus::Frozen;
        (SourceStatus::Frozen, HealthClass::Frozen { entered })
    } else if back_online {
        (gateway.into(), HealthClass::BackOnline)
    } else {
        (gateway.into(), HealthClass::Healthy)
    };

    HealthEvaluation {
        previous_status,
        snapshot: HealthSnapshot {
            status,
            last_checked_at: now,
            consecutive_failures: 0,
            last_success_at: Some(last_success_at),
            last_fingerprint,
        },
        class,
        back_online,
    }
}

/// Per-source health records
///
/// Updates are read-modify-write under the write lock, so concurrent checks
/// of different sources never lose each other's updates.
#[derive(Debug, Default)]
pub struct HealthRecordStore {
    records: RwLock<HashMap<String, HealthSnapshot>>,
}

impl HealthRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate and store the new record of a source atomically
    pub async fn apply<F>(&self, source_id: &str, evaluate: F) -> HealthEvaluation
    where
        F: FnOnce(Option<&HealthSnapshot>) -> HealthEvaluation,
    {
        let mut records = self.records.write().await;
        let evaluation = evaluate(records.get(source_id));
        records.insert(source_id.to_string(), evaluation.snapshot.clone());
        evaluation
    }

    pub async fn get(&self, source_id: &str) -> Option<HealthSnapshot> {
        self.records.read().await.get(source_id).cloned()
    }

    /// Copy of all records, keyed by source id
    pub async fn snapshot(&self) -> HashMap<String, HealthSnapshot> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
