//! In-memory source registry (no persistence)
//!
//! This backend keeps source records in a map guarded by a read/write lock.
//! It's useful for:
//! - Running the hub from a static list of sources in the config file
//! - Testing without an external registry
//!
//! ## Limitations
//!
//! - **No persistence**: status updates are lost on restart

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::error::{RegistryError, RegistryResult};
use super::SourceRegistry;
use crate::Source;

/// In-memory source registry
///
/// Records are keyed by id; a `BTreeMap` keeps listing order stable.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    sources: RwLock<BTreeMap<String, Source>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the given sources
    ///
    /// Later entries win when two sources share an id.
    pub fn with_sources(sources: impl IntoIterator<Item = Source>) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.id.clone(), source))
            .collect::<BTreeMap<_, _>>();

        debug!("seeded in-memory registry with {} sources", sources.len());

        Self {
            sources: RwLock::new(sources),
        }
    }

    /// Insert or replace a source
    pub async fn insert(&self, source: Source) {
        self.sources.write().await.insert(source.id.clone(), source);
    }

    pub async fn len(&self) -> usize {
        self.sources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sources.read().await.is_empty()
    }
}

#[async_trait]
impl SourceRegistry for MemoryRegistry {
    async fn list(&self, page: usize, page_size: usize) -> RegistryResult<Vec<Source>> {
        if page == 0 || page_size == 0 {
            return Err(RegistryError::InvalidQuery(format!(
                "page {page} with size {page_size}"
            )));
        }

        let sources = self.sources.read().await;
        let listed = sources
            .values()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect::<Vec<_>>();

        trace!("listed {} sources (page {page}, size {page_size})", listed.len());

        Ok(listed)
    }

    async fn get_by_id(&self, id: &str) -> RegistryResult<Source> {
        self.sources
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    async fn update(&self, id: &str, source: Source) -> RegistryResult<()> {
        if source.id != id {
            return Err(RegistryError::IdMismatch {
                expected: id.to_string(),
                actual: source.id,
            });
        }

        let mut sources = self.sources.write().await;
        let Some(existing) = sources.get_mut(id) else {
            return Err(RegistryError::NotFound(id.to_string()));
        };

        *existing = source;
        Ok(())
    }
}
