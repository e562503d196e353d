//! MonitorActor - Periodically checks all active sources
//!
//! Each cycle lists the active sources and launches one check task per
//! source. A shared semaphore bounds how many checks talk to the gateway at
//! the same time. The cycle waits for its checks up to a deadline of twice
//! the interval; checks still running after that keep going in the
//! background and their sources are skipped until they finish.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, error, info, instrument, trace, warn};

use super::messages::{CycleReport, MonitorCommand};
use crate::monitors::checker::HealthChecker;
use crate::monitors::health::{HealthRecordStore, HealthSnapshot};
use crate::registry::SourceRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub max_concurrent_checks: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_concurrent_checks: 5,
        }
    }
}

impl MonitorSettings {
    /// Time a cycle waits for its checks
    pub fn cycle_deadline(&self) -> Duration {
        self.interval * 2
    }
}

type InFlightSet = Arc<Mutex<HashSet<String>>>;

/// Marks a source as being checked until dropped
struct InFlight {
    set: InFlightSet,
    source_id: String,
}

impl InFlight {
    fn claim(set: &InFlightSet, source_id: &str) -> Option<Self> {
        let mut sources = set.lock().unwrap_or_else(PoisonError::into_inner);

        if !sources.insert(source_id.to_string()) {
            return None;
        }

        Some(Self {
            set: set.clone(),
            source_id: source_id.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.source_id);
    }
}

/// Actor that drives the periodic health checks
pub struct MonitorActor {
    settings: MonitorSettings,
    registry: Arc<dyn SourceRegistry>,
    checker: HealthChecker,
    semaphore: Arc<Semaphore>,
    in_flight: InFlightSet,
    command_rx: mpsc::Receiver<MonitorCommand>,
}

impl MonitorActor {
    pub fn new(
        settings: MonitorSettings,
        registry: Arc<dyn SourceRegistry>,
        checker: HealthChecker,
        command_rx: mpsc::Receiver<MonitorCommand>,
    ) -> Self {
        Self {
            settings,
            registry,
            checker,
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent_checks.max(1))),
            in_flight: Arc::default(),
            command_rx,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first cycle starts immediately. Runs until a Shutdown command is
    /// received or the command channel is closed.
    #[instrument(skip(self), fields(interval = ?self.settings.interval))]
    pub async fn run(mut self) {
        debug!("starting monitor actor");

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!("monitor cycle failed: {e:#}");
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(MonitorCommand::CheckNow { respond_to }) => {
                            debug!("received CheckNow command");
                            let result = self.run_cycle().await;
                            let _ = respond_to.send(result);
                        }

                        Some(MonitorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("monitor actor stopped");
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        let sources = self
            .registry
            .list_active()
            .await
            .context("failed to list active sources")?;

        let mut report = CycleReport {
            listed: sources.len(),
            ..CycleReport::default()
        };

        let mut checks = Vec::with_capacity(sources.len());

        for source in sources {
            let Some(guard) = InFlight::claim(&self.in_flight, &source.id) else {
                trace!("previous check of {} still running, skipping", source.id);
                report.skipped += 1;
                continue;
            };

            let semaphore = self.semaphore.clone();
            let checker = self.checker.clone();

            checks.push(tokio::spawn(async move {
                let _guard = guard;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                checker.check(&source).await;
            }));
            report.checked += 1;
        }

        let deadline = self.settings.cycle_deadline();
        match timeout(deadline, join_all(checks)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!("check task failed: {e}");
                    }
                }
            }
            Err(_) => {
                // dropping the join handles detaches the checks, it does not cancel them
                warn!("checks did not finish within {deadline:?}, continuing in background");
                report.timed_out = true;
            }
        }

        info!(
            "monitor cycle done: {} listed, {} checked, {} skipped",
            report.listed, report.checked, report.skipped
        );

        Ok(report)
    }
}

/// Handle for controlling the MonitorActor
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
    store: Arc<HealthRecordStore>,
}

impl MonitorHandle {
    /// Spawn the monitor actor, starting the first cycle right away
    pub fn spawn(
        settings: MonitorSettings,
        registry: Arc<dyn SourceRegistry>,
        checker: HealthChecker,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let store = checker.store().clone();

        let actor = MonitorActor::new(settings, registry, checker, cmd_rx);

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            store,
        }
    }

    /// Run a cycle immediately and wait for it
    pub async fn check_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::CheckNow { respond_to: tx })
            .await
            .context("monitor is not running")?;

        rx.await.context("monitor stopped during the cycle")?
    }

    /// Stop scheduling new cycles
    ///
    /// Does not wait for in-flight checks. Calling it again is a no-op.
    pub async fn stop(&self) {
        if self.sender.send(MonitorCommand::Shutdown).await.is_err() {
            trace!("monitor already stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Copy of the current health record of every checked source
    pub async fn get_health_snapshot(&self) -> HashMap<String, HealthSnapshot> {
        self.store.snapshot().await
    }

    pub async fn get_health(&self, source_id: &str) -> Option<HealthSnapshot> {
        self.store.get(source_id).await
    }
}
