//! Source registry abstraction
//!
//! The registry holds the durable source records. The health monitor is a
//! consumer: it lists active sources on every cycle and writes back the
//! observed `status`/`last_seen` (and new stream details after a restart).
//!
//! ## Backends
//!
//! - **In-Memory**: seeded from the configuration file, used by the hub binary and tests

pub mod error;
pub mod memory;

use async_trait::async_trait;

use crate::Source;

pub use error::{RegistryError, RegistryResult};
pub use memory::MemoryRegistry;

/// Page size used when the monitor lists the whole fleet
pub const LIST_ALL_PAGE_SIZE: usize = 1000;

/// Trait for source registry backends
///
/// Implementations must be `Send + Sync` as they are shared by all
/// concurrently running health checks.
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// List sources ordered by id. `page` starts at 1.
    async fn list(&self, page: usize, page_size: usize) -> RegistryResult<Vec<Source>>;

    /// Fetch a single source
    async fn get_by_id(&self, id: &str) -> RegistryResult<Source>;

    /// Replace the full record of a source
    ///
    /// Idempotent: writing the same record twice has no further effect.
    async fn update(&self, id: &str, source: Source) -> RegistryResult<()>;

    /// List all sources with the active flag set
    async fn list_active(&self) -> RegistryResult<Vec<Source>> {
        let sources = self.list(1, LIST_ALL_PAGE_SIZE).await?;
        Ok(sources.into_iter().filter(|source| source.active).collect())
    }
}
