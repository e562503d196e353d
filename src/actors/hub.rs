//! HubActor - Fans monitor events out to connected observers
//!
//! A single actor task owns the set of observer connections. All changes to
//! that set and every broadcast go through its inbound queues and are
//! processed one at a time, so every observer sees the same relative order
//! of events.
//!
//! ## Queues
//!
//! ```text
//! register   (bounded, acked)   ─┐
//! unregister (unbounded)        ─┼→ HubActor → observer 1 .. observer N
//! broadcast  (bounded)          ─┤      │
//! control    (count, shutdown)  ─┘      └─ write failure → unregister queue
//! ```
//!
//! A write to an observer never blocks the actor: each observer has its own
//! bounded outbound queue and a full or closed queue counts as a write
//! failure. The failed observer is fed back through the unregister queue
//! instead of being removed in the middle of a broadcast.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result, anyhow};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::HubConfig;

use super::messages::{HubCommand, MonitorEvent, ObserverMessage};

/// Identifier of an observer connection, unique for the hub's lifetime
pub type ObserverId = u64;

const WELCOME_MESSAGE: &str = "Connected to feedwatch event stream";

/// Registration request, answered once the observer is part of the set
struct Registration {
    respond_to: oneshot::Sender<Subscription>,
}

/// Actor that owns all observer connections
pub struct HubActor {
    /// Outbound queue per observer, ordered by id
    observers: BTreeMap<ObserverId, mpsc::Sender<ObserverMessage>>,

    /// Observers with a failed write whose unregistration is queued
    pending_removal: HashSet<ObserverId>,

    next_id: ObserverId,

    observer_buffer: usize,

    register_rx: mpsc::Receiver<Registration>,

    unregister_rx: mpsc::UnboundedReceiver<ObserverId>,

    /// Feedback path for write failures
    unregister_tx: mpsc::UnboundedSender<ObserverId>,

    broadcast_rx: mpsc::Receiver<MonitorEvent>,

    command_rx: mpsc::Receiver<HubCommand>,
}

impl HubActor {
    fn new(
        observer_buffer: usize,
        register_rx: mpsc::Receiver<Registration>,
        unregister_rx: mpsc::UnboundedReceiver<ObserverId>,
        unregister_tx: mpsc::UnboundedSender<ObserverId>,
        broadcast_rx: mpsc::Receiver<MonitorEvent>,
        command_rx: mpsc::Receiver<HubCommand>,
    ) -> Self {
        Self {
            observers: BTreeMap::new(),
            pending_removal: HashSet::new(),
            next_id: 1,
            observer_buffer: observer_buffer.max(1),
            register_rx,
            unregister_rx,
            unregister_tx,
            broadcast_rx,
            command_rx,
        }
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command is received or every handle is dropped.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting hub actor");

        loop {
            tokio::select! {
                biased;

                Some(registration) = self.register_rx.recv() => {
                    self.register(registration);
                }

                Some(id) = self.unregister_rx.recv() => {
                    self.unregister(id);
                }

                Some(event) = self.broadcast_rx.recv() => {
                    self.broadcast(event);
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(HubCommand::ObserverCount { respond_to }) => {
                            let _ = respond_to.send(self.observers.len());
                        }

                        Some(HubCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            debug!("all hub handles dropped, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        // dropping the senders closes every observer connection
        self.observers.clear();
        debug!("hub actor stopped");
    }

    fn register(&mut self, registration: Registration) {
        let id = self.next_id;
        self.next_id += 1;

        let (sender, receiver) = mpsc::channel(self.observer_buffer);
        let responder = HeartbeatResponder {
            id,
            sender: sender.downgrade(),
        };

        self.observers.insert(id, sender.clone());
        let clients = self.observers.len();

        let welcome = ObserverMessage::Connected {
            message: WELCOME_MESSAGE.to_string(),
            clients,
        };
        if sender.try_send(welcome).is_err() {
            warn!("failed to queue welcome message for observer {id}");
        }

        let subscription = Subscription {
            id,
            receiver,
            responder,
        };

        if registration.respond_to.send(subscription).is_err() {
            debug!("observer {id} went away before registration completed");
            self.observers.remove(&id);
            return;
        }

        info!("observer {id} connected, total observers: {}", self.observers.len());
    }

    fn unregister(&mut self, id: ObserverId) {
        self.pending_removal.remove(&id);

        if self.observers.remove(&id).is_some() {
            info!("observer {id} disconnected, total observers: {}", self.observers.len());
        } else {
            trace!("observer {id} already unregistered");
        }
    }

    fn broadcast(&mut self, event: MonitorEvent) {
        let message = ObserverMessage::from(event);
        let mut delivered = 0;
        let mut failed = vec![];

        for (id, sender) in &self.observers {
            if self.pending_removal.contains(id) {
                continue;
            }

            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("observer {id} is not keeping up, dropping connection");
                    failed.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("observer {id} connection closed");
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            self.pending_removal.insert(id);
            // the actor holds a sender itself, so this cannot fail while running
            let _ = self.unregister_tx.send(id);
        }

        trace!("broadcast delivered to {delivered} observers");
    }
}

/// Live subscription of one observer
///
/// The first message is always `ObserverMessage::Connected`. The receiver
/// yields `None` once the hub has unregistered the observer and the queue
/// is drained.
#[derive(Debug)]
pub struct Subscription {
    id: ObserverId,
    receiver: mpsc::Receiver<ObserverMessage>,
    responder: HeartbeatResponder,
}

impl Subscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<ObserverMessage> {
        self.receiver.recv().await
    }

    pub fn responder(&self) -> HeartbeatResponder {
        self.responder.clone()
    }

    /// Split into the outbound stream and the heartbeat responder
    pub fn into_parts(self) -> (mpsc::Receiver<ObserverMessage>, HeartbeatResponder) {
        (self.receiver, self.responder)
    }
}

/// Answers heartbeats on the observer's own outbound queue
///
/// Holds only a weak reference: once the hub drops the observer, answering
/// fails and the connection can close.
#[derive(Debug, Clone)]
pub struct HeartbeatResponder {
    id: ObserverId,
    sender: mpsc::WeakSender<ObserverMessage>,
}

impl HeartbeatResponder {
    pub fn answer(&self, payload: serde_json::Value) -> Result<()> {
        let sender = self
            .sender
            .upgrade()
            .ok_or_else(|| anyhow!("observer {} is no longer registered", self.id))?;

        sender
            .try_send(ObserverMessage::Pong { timestamp: payload })
            .map_err(|e| anyhow!("failed to queue heartbeat answer for observer {}: {e}", self.id))
    }
}

/// Handle for the hub actor
///
/// Cheap to clone and shared by every producer and observer endpoint.
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::UnboundedSender<ObserverId>,
    broadcast_tx: mpsc::Sender<MonitorEvent>,
    command_tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Spawn a new hub actor
    pub fn spawn(config: &HubConfig) -> Self {
        let (register_tx, register_rx) = mpsc::channel(32);
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_buffer.max(1));
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = HubActor::new(
            config.observer_buffer,
            register_rx,
            unregister_rx,
            unregister_tx.clone(),
            broadcast_rx,
            command_rx,
        );

        tokio::spawn(actor.run());

        Self {
            register_tx,
            unregister_tx,
            broadcast_tx,
            command_tx,
        }
    }

    /// Register a new observer
    ///
    /// Returns once the observer is part of the set: every event published
    /// afterwards is delivered to it.
    pub async fn subscribe(&self) -> Result<Subscription> {
        let (tx, rx) = oneshot::channel();
        self.register_tx
            .send(Registration { respond_to: tx })
            .await
            .map_err(|_| anyhow!("hub is not running"))?;

        rx.await.context("hub dropped the registration")
    }

    /// Remove an observer and close its connection
    ///
    /// Idempotent: unknown or already removed ids are ignored.
    pub fn unsubscribe(&self, id: ObserverId) {
        if self.unregister_tx.send(id).is_err() {
            trace!("hub is not running, ignoring unsubscribe of {id}");
        }
    }

    /// Queue an event for delivery to all current observers
    pub async fn publish(&self, event: MonitorEvent) {
        if let Err(e) = self.broadcast_tx.send(event).await {
            warn!("hub is not running, dropping event for {}", e.0.source_id());
        }
    }

    /// Number of currently connected observers
    pub async fn observer_count(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(HubCommand::ObserverCount { respond_to: tx })
            .await
            .map_err(|_| anyhow!("hub is not running"))?;

        rx.await.context("failed to receive observer count")
    }

    /// Close all observer connections and stop the hub
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(HubCommand::Shutdown).await;
    }
}
