//! Binary object storage.
//!
//! A [`BlobStore`] keeps opaque binary objects addressed by a store-generated id. Writing hands out
//! an async writer together with the new id; reading copies an object into a caller-provided
//! writer.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use bson::Document;
use tokio::io::AsyncWrite;

use crate::{config::FieldRule, driver::Driver, error::DatabaseResult};

/// Opaque identifier of a stored object.
pub type BlobId = String;

/// Writer returned by [`BlobStore::writer`]. The object is complete once the writer is shut down.
pub type BlobWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Allocates a new object and returns its id and a writer for its content.
    async fn writer(&self) -> DatabaseResult<(BlobId, BlobWriter)>;

    /// Copies the object `id` into `writer`, returning the number of bytes written.
    async fn read(&self, id: &str, writer: &mut (dyn AsyncWrite + Send + Unpin)) -> DatabaseResult<u64>;

    /// Deletes the object `id`.
    async fn remove(&self, id: &str) -> DatabaseResult<()>;
}

/// What a BLOB store gets to know about the database that owns it.
#[derive(Debug, Clone)]
pub struct BlobContext {
    /// The database's driver, for stores that keep metadata next to the rows.
    pub driver: Arc<dyn Driver>,
    pub readonly: bool,
}

/// Builds a BLOB store from the `blobStore` section of a database configuration.
#[async_trait]
pub trait BlobStoreFactory: Send + Sync {
    async fn build(&self, config: &Document, context: BlobContext) -> DatabaseResult<Arc<dyn BlobStore>>;

    fn rules(&self) -> &'static [FieldRule] {
        &[]
    }
}
