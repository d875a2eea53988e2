//! Snapshot cache seam.
//!
//! Keys come from [`crate::keys::run_key`]; the cache only stores and returns
//! probe snapshots and never interprets them.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use shelfprobe_core::PageSnapshot;

#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<PageSnapshot>;
    async fn put(&self, key: &str, snapshot: &PageSnapshot);
}

/// Never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl SnapshotCache for NoCache {
    async fn get(&self, _key: &str) -> Option<PageSnapshot> {
        None
    }

    async fn put(&self, _key: &str, _snapshot: &PageSnapshot) {}
}

/// Process-local cache, shared between runs through an `Arc`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, PageSnapshot>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<PageSnapshot> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    async fn put(&self, key: &str, snapshot: &PageSnapshot) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), snapshot.clone());
    }
}
