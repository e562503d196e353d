use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use super::backoff::BackoffTracker;
use super::bounded;
use super::health::{
    FingerprintProbe, HealthClass, HealthEvaluation, HealthPolicy, HealthRecordStore, Observation,
    evaluate,
};
use super::recovery::Recovery;
use crate::Source;
use crate::actors::hub::HubHandle;
use crate::actors::messages::{MonitorEvent, NoticeKind};
use crate::config::MonitorConfig;
use crate::gateway::{GatewayError, StreamGateway};
use crate::registry::SourceRegistry;

/// Result of checking one source
#[derive(Debug)]
pub struct CheckOutcome {
    pub evaluation: HealthEvaluation,

    /// Restart spawned by this check, if recovery was admitted
    pub recovery: Option<JoinHandle<()>>,
}

/// Checks a single source against the gateway and acts on the result
#[derive(Clone)]
pub struct HealthChecker {
    registry: Arc<dyn SourceRegistry>,
    gateway: Arc<dyn StreamGateway>,
    hub: HubHandle,
    store: Arc<HealthRecordStore>,
    recovery: Recovery,
    policy: HealthPolicy,
}

impl HealthChecker {
    pub fn new(
        registry: Arc<dyn SourceRegistry>,
        gateway: Arc<dyn StreamGateway>,
        hub: HubHandle,
        config: &MonitorConfig,
    ) -> Self {
        let policy = config.health_policy();
        let backoff = Arc::new(BackoffTracker::new(config.backoff_policy()));
        let recovery = Recovery::new(
            registry.clone(),
            gateway.clone(),
            hub.clone(),
            backoff,
            config.restart_pause(),
            policy.call_timeout,
        );

        Self {
            registry,
            gateway,
            hub,
            store: Arc::new(HealthRecordStore::new()),
            recovery,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<HealthRecordStore> {
        &self.store
    }

    pub fn backoff(&self) -> &Arc<BackoffTracker> {
        self.recovery.backoff()
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    pub async fn check(&self, source: &Source) -> Option<CheckOutcome> {
        self.check_at(source, Utc::now()).await
    }

    /// Check a source as of `now`
    ///
    /// Returns `None` for sources that have no gateway stream yet.
    #[instrument(skip_all, fields(source = %source.id))]
    pub async fn check_at(&self, source: &Source, now: DateTime<Utc>) -> Option<CheckOutcome> {
        let Some(stream_id) = source.stream_id() else {
            trace!("no stream registered, skipping");
            return None;
        };

        let observation = self.observe(stream_id).await;

        let evaluation = self
            .store
            .apply(&source.id, |prior| {
                evaluate(prior, source.status, &observation, now, &self.policy)
            })
            .await;

        let status = evaluation.snapshot.status;
        match evaluation.class {
            HealthClass::Healthy => trace!("healthy ({status})"),
            HealthClass::Absorbed => debug!(
                "check failed ({}/{}), keeping {status}",
                evaluation.snapshot.consecutive_failures, self.policy.failure_threshold
            ),
            HealthClass::ConfirmedOffline { escalated: true } => {
                warn!("{} is {status}", source.name)
            }
            HealthClass::ConfirmedOffline { escalated: false } => debug!(
                "still {status} after {} failures",
                evaluation.snapshot.consecutive_failures
            ),
            HealthClass::BackOnline => info!("{} is back {status}", source.name),
            HealthClass::Frozen { entered } => {
                if evaluation.back_online {
                    info!("{} is back", source.name);
                }
                if entered {
                    warn!("{} appears frozen", source.name);
                } else {
                    debug!("still frozen");
                }
            }
        }

        // a restart may have replaced the stream details since listing
        let mut updated = match self.registry.get_by_id(&source.id).await {
            Ok(current) => current,
            Err(e) => {
                debug!("re-reading {} failed, using listed record: {e}", source.id);
                source.clone()
            }
        };
        updated.status = status;
        updated.last_seen = Some(now);

        if let Err(e) = self.registry.update(&source.id, updated.clone()).await {
            error!("failed to store status of {}: {e}", source.id);
        }

        if evaluation.status_changed() {
            self.hub
                .publish(MonitorEvent::status_changed(&source.id, status, now))
                .await;
        }

        for (kind, message) in notices_for(&evaluation) {
            self.hub
                .publish(MonitorEvent::notice(&source.id, &source.name, kind, message))
                .await;
        }

        let recovery = if evaluation.needs_recovery() {
            self.recovery.request(updated, now).await
        } else {
            None
        };

        Some(CheckOutcome {
            evaluation,
            recovery,
        })
    }

    async fn observe(&self, stream_id: &str) -> Observation {
        let timeout = self.policy.call_timeout;

        let status = match bounded(timeout, self.gateway.stream_status(stream_id)).await {
            Ok(status) => status,
            Err(e) => {
                debug!("status of stream {stream_id} unavailable: {e}");
                return Observation::unreachable();
            }
        };

        if !status.is_success() {
            return Observation::reported(status, FingerprintProbe::NotAttempted);
        }

        let fingerprint =
            match bounded(timeout, self.gateway.content_fingerprint(stream_id)).await {
                Ok(fingerprint) => FingerprintProbe::Captured(fingerprint),
                Err(GatewayError::Unsupported) => FingerprintProbe::Unsupported,
                Err(e) => {
                    debug!("failed to fingerprint stream {stream_id}: {e}");
                    FingerprintProbe::Failed
                }
            };

        Observation::reported(status, fingerprint)
    }
}

fn notices_for(evaluation: &HealthEvaluation) -> Vec<(NoticeKind, &'static str)> {
    let mut notices = vec![];
    if !evaluation.notify() {
        return notices;
    }

    if evaluation.back_online {
        notices.push((NoticeKind::Online, "Stream is back online"));
    }

    match evaluation.class {
        HealthClass::ConfirmedOffline { .. } => notices.push((
            NoticeKind::Offline,
            "Stream is offline. Attempting to reconnect...",
        )),
        HealthClass::Frozen { entered: true } => notices.push((
            NoticeKind::Frozen,
            "Stream appears frozen. Refreshing...",
        )),
        HealthClass::Frozen { entered: false }
        | HealthClass::BackOnline
        | HealthClass::Healthy
        | HealthClass::Absorbed => {}
    }

    notices
}
