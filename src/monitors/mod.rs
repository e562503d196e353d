//! Health checking and recovery of video sources
//!
//! - [`health`]: per-source health records and the pure check classification
//! - [`backoff`]: exponential backoff bookkeeping for recovery attempts
//! - [`checker`]: runs one check against the gateway and acts on the result
//! - [`recovery`]: detached stream restarts

pub mod backoff;
pub mod checker;
pub mod health;
pub mod recovery;

use std::future::Future;
use std::time::Duration;

use crate::gateway::{GatewayError, GatewayResult};

pub use backoff::{BackoffPolicy, BackoffTracker};
pub use checker::HealthChecker;
pub use health::{HealthPolicy, HealthRecordStore, HealthSnapshot};
pub use recovery::Recovery;

/// Run a gateway call with an upper time bound
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = GatewayResult<T>>,
) -> GatewayResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(GatewayError::Timeout(limit)))
}
