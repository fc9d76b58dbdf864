//! In-memory storage
//!
//! A [`Storage`] backed by a concurrent map. Useful for tests and for
//! repositories that do not need to survive a restart.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{Storage, StoredItem};
use crate::cache::AttributeBag;

/// In-memory asset storage; clones share the same assets
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<DashMap<String, StoredItem>>,
    writes: Arc<AtomicU64>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.items.contains_key(path)
    }

    /// Number of content and attribute writes so far
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, path: &str) -> io::Result<Option<StoredItem>> {
        Ok(self.items.get(path).map(|item| item.clone()))
    }

    async fn put(&self, path: &str, item: StoredItem) -> io::Result<()> {
        self.items.insert(path.to_owned(), item);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn read_attributes(&self, path: &str) -> io::Result<Option<AttributeBag>> {
        Ok(self.items.get(path).map(|item| item.attributes.clone()))
    }

    async fn write_attributes(&self, path: &str, attributes: AttributeBag) -> io::Result<()> {
        let mut item = self
            .items
            .get_mut(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_owned()))?;
        item.attributes = attributes;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
