//! Actor-based monitoring system
//!
//! Each actor runs as an independent async task communicating via Tokio
//! channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!                ┌─────────────────┐
//!                │  MonitorActor   │  tick / CheckNow
//!                └────────┬────────┘
//!                         │ one task per source (semaphore-bounded)
//!           ┌─────────────┼─────────────┐
//!           ▼             ▼             ▼
//!     HealthChecker HealthChecker HealthChecker ──→ Recovery (detached)
//!           │             │             │              │
//!           └─────────────┼─────────────┴──────────────┘
//!                         │ MonitorEvent
//!                ┌────────▼────────┐
//!                │    HubActor     │
//!                └────────┬────────┘
//!                         │ ObserverMessage
//!              ┌──────────┼──────────┐
//!              ▼          ▼          ▼
//!         observer 1  observer 2  observer N
//! ```
//!
//! ## Actor Types
//!
//! - **MonitorActor**: Runs check cycles over all active sources
//! - **HubActor**: Owns observer connections and fans events out to them
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel for control messages
//! 2. **Events**: Checkers and recovery tasks publish to the hub's broadcast queue
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod hub;
pub mod messages;
pub mod monitor;
