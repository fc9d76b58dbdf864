//! Collaborator contracts of the proxy pipeline
//!
//! The pipeline owns no I/O. Storage and the outbound transport are supplied
//! by the embedding application behind these traits, which keeps them easy to
//! swap for test doubles.

use std::fmt::Debug;
use std::io;

use async_trait::async_trait;

use super::request::{RemoteRequest, RemoteResponse};
use crate::cache::AttributeBag;
use crate::error::TransportError;

/// A stored asset: its bytes plus the free-form attribute bag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredItem {
    pub content: Vec<u8>,
    pub attributes: AttributeBag,
}

impl StoredItem {
    #[must_use]
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            attributes: AttributeBag::new(),
        }
    }
}

/// Local asset storage, keyed by logical path
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Stored asset at `path`, if any
    async fn get(&self, path: &str) -> io::Result<Option<StoredItem>>;

    /// Store an asset, replacing content and attributes
    async fn put(&self, path: &str, item: StoredItem) -> io::Result<()>;

    /// Attributes of the asset at `path`, if it exists
    async fn read_attributes(&self, path: &str) -> io::Result<Option<AttributeBag>>;

    /// Replace the attributes of an existing asset
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::NotFound`] if no asset is stored at `path`.
    async fn write_attributes(&self, path: &str, attributes: AttributeBag) -> io::Result<()>;
}

/// Outbound transport to the remote origin
///
/// HTTP statuses are payload: a 404 is an `Ok` response. Errors are reserved
/// for calls that produced no response at all.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn fetch(&self, request: &RemoteRequest) -> Result<RemoteResponse, TransportError>;
}
