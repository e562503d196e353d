use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::backoff::{Admission, BackoffTracker};
use super::bounded;
use crate::actors::hub::HubHandle;
use crate::actors::messages::{MonitorEvent, NoticeKind};
use crate::gateway::{StreamGateway, StreamRegistration};
use crate::registry::SourceRegistry;
use crate::{Source, SourceStatus};

/// Restarts streams of failed or frozen sources
///
/// Every admitted request runs as its own detached task. The backoff tracker
/// decides whether a request is admitted at all.
#[derive(Clone)]
pub struct Recovery {
    registry: Arc<dyn SourceRegistry>,
    gateway: Arc<dyn StreamGateway>,
    hub: HubHandle,
    backoff: Arc<BackoffTracker>,
    restart_pause: Duration,
    call_timeout: Duration,
}

impl Recovery {
    pub fn new(
        registry: Arc<dyn SourceRegistry>,
        gateway: Arc<dyn StreamGateway>,
        hub: HubHandle,
        backoff: Arc<BackoffTracker>,
        restart_pause: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            gateway,
            hub,
            backoff,
            restart_pause,
            call_timeout,
        }
    }

    pub fn backoff(&self) -> &Arc<BackoffTracker> {
        &self.backoff
    }

    /// Request a restart of the source's stream
    ///
    /// Returns the handle of the spawned restart, or `None` when the source
    /// is still backing off from an earlier attempt.
    pub async fn request(&self, source: Source, now: DateTime<Utc>) -> Option<JoinHandle<()>> {
        let admission = self.backoff.try_begin(&source.id, now).await?;

        let recovery = self.clone();
        Some(tokio::spawn(recovery.restart(source, admission)))
    }

    #[instrument(skip_all, fields(source = %source.id, attempt = admission.attempt))]
    async fn restart(self, source: Source, admission: Admission) {
        info!("restarting stream of {} (attempt #{})", source.name, admission.attempt);

        if let Some(stream_id) = source.stream_id() {
            if let Err(e) = bounded(self.call_timeout, self.gateway.remove_stream(stream_id)).await
            {
                warn!("failed to remove stream {stream_id}, adding anyway: {e}");
            }

            tokio::time::sleep(self.restart_pause).await;
        }

        let added = bounded(
            self.call_timeout,
            self.gateway
                .add_stream(&source.id, &source.name, &source.locator),
        )
        .await;

        match added {
            Ok(registration) => self.restarted(source, registration).await,
            Err(e) => {
                error!("failed to restart stream of {}: {e}", source.name);

                let message = format!(
                    "Failed to restart stream (attempt #{}). Will retry in {}s...",
                    admission.attempt,
                    admission.retry_in.as_secs()
                );
                self.hub
                    .publish(MonitorEvent::notice(
                        &source.id,
                        &source.name,
                        NoticeKind::RestartFailed,
                        message,
                    ))
                    .await;
            }
        }
    }

    async fn restarted(&self, source: Source, registration: StreamRegistration) {
        self.backoff.clear(&source.id).await;

        // write on top of the current record, not the copy taken at check time
        let mut current = match self.registry.get_by_id(&source.id).await {
            Ok(current) => current,
            Err(e) => {
                debug!("could not re-read {}, using checked record: {e}", source.id);
                source
            }
        };

        let now = Utc::now();
        current.stream_id = Some(registration.stream_id);
        current.media_url = Some(registration.media_url);
        current.snapshot_url = Some(registration.snapshot_url);
        current.status = SourceStatus::Online;
        current.last_seen = Some(now);

        if let Err(e) = self.registry.update(&current.id, current.clone()).await {
            error!("failed to store restarted stream of {}: {e}", current.id);
        }

        info!("stream of {} restarted", current.name);

        self.hub
            .publish(MonitorEvent::notice(
                &current.id,
                &current.name,
                NoticeKind::Restarted,
                "Stream restarted successfully",
            ))
            .await;
        self.hub
            .publish(MonitorEvent::status_changed(
                &current.id,
                SourceStatus::Online,
                now,
            ))
            .await;
    }
}
