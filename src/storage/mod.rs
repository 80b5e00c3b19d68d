//! Ports to the managed services the pipeline talks to.
//!
//! Each stage receives its collaborators as `Arc<dyn Trait>` at
//! construction, so one invocation can run against AWS and a test against
//! the in-memory fakes.
//!
//! ## Backends
//!
//! ```text
//! storage/
//! ├── local.rs     # ObjectStore on the local filesystem (CLI, tests)
//! ├── memory.rs    # In-memory queue, catalog, topic, signer (CLI, tests)
//! ├── s3.rs        # ObjectStore + UploadSigner        [aws]
//! ├── sqs.rs       # MessageChannel                    [aws]
//! ├── dynamodb.rs  # CatalogStore                      [aws]
//! └── sns.rs       # NotificationTopic                 [aws]
//! ```

pub mod local;
pub mod memory;

#[cfg(feature = "aws")]
pub mod dynamodb;
#[cfg(feature = "aws")]
pub mod s3;
#[cfg(feature = "aws")]
pub mod sns;
#[cfg(feature = "aws")]
pub mod sqs;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::models::{CatalogItem, InventoryRecord, Notification, ObjectLocation};

// Re-export for convenience
pub use local::LocalObjectStore;
pub use memory::{MemoryCatalog, MemoryObjectStore, MemoryQueue, MemorySigner, MemoryTopic};

/// Streaming body of a stored object.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Object storage holding uploaded files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open an object for streaming reads.
    ///
    /// Returns `AppError::ObjectNotFound` when nothing is stored at `location`.
    async fn open(&self, location: &ObjectLocation) -> Result<ObjectReader>;

    /// Server-side copy within the store.
    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()>;

    async fn delete(&self, location: &ObjectLocation) -> Result<()>;
}

/// Issues time-limited write URLs into object storage.
#[async_trait]
pub trait UploadSigner: Send + Sync {
    async fn presign_put(
        &self,
        location: &ObjectLocation,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String>;
}

/// At-least-once queue carrying one row per message.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, body: &str) -> Result<()>;
}

/// Outcome of a create-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Both records were written
    Created,
    /// A product or stock record with this id already exists; nothing was written
    AlreadyExists,
}

/// Catalog datastore holding products and their stock.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Atomically create the product and its stock record.
    ///
    /// Either both records are written or neither is. A collision on either
    /// key yields `WriteOutcome::AlreadyExists`, never an overwrite.
    async fn create_product(
        &self,
        item: &CatalogItem,
        stock: &InventoryRecord,
    ) -> Result<WriteOutcome>;

    /// Whether the creation notification for a product has gone out.
    async fn is_notified(&self, product_id: &str) -> Result<bool>;

    /// Record that the creation notification was published.
    async fn mark_notified(&self, product_id: &str) -> Result<()>;
}

/// Pub/sub topic fanning notifications out to subscribers.
#[async_trait]
pub trait NotificationTopic: Send + Sync {
    /// Publish with the price as a numeric routing attribute.
    async fn publish(&self, notification: &Notification) -> Result<()>;
}
