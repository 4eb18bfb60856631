//! Store abstractions for the `items` document collection and the image
//! blob store.
//!
//! Both stores are remote and shared by every client. The document store
//! pushes the complete collection on every change through
//! [`DocumentStore::subscribe`]; there is no diffing anywhere.

mod memory;

pub use memory::{MemoryBlobStore, MemoryDocumentStore};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::models::{Item, ItemUpdate, NewItem};

/// The complete contents of the `items` collection at one point in time.
pub type Snapshot = Vec<Item>;

/// Stream of snapshots delivered by a subscription. The first element is
/// the collection as it was when the subscription opened.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot, StoreError>>;

/// Number of snapshots buffered per subscriber before it starts lagging.
pub const SUBSCRIBER_BUFFER: usize = 16;

/// The `items` document collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates a document and returns the id the store assigned to it.
    async fn create(&self, item: NewItem) -> Result<String, StoreError>;

    /// Applies a partial field update. Fails with `NotFound` if the
    /// document does not exist.
    async fn update(&self, id: &str, update: &ItemUpdate) -> Result<(), StoreError>;

    /// Deletes a document by id. Deleting a missing document succeeds.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// One-shot read of the whole collection.
    async fn query_all(&self) -> Result<Snapshot, StoreError>;

    /// Opens a standing subscription on the whole collection.
    async fn subscribe(&self) -> Result<SnapshotStream, StoreError>;
}

/// Path-addressed blob storage for item images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads bytes to `path`, replacing any existing blob.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Returns the durable retrieval URL of an existing blob.
    async fn download_url(&self, path: &str) -> Result<String, StoreError>;

    /// Reads the bytes of a blob.
    async fn download(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Deletes a blob. Fails with `BlobNotFound` if it does not exist.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Lists blob paths starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Builds a subscription stream from an initial snapshot and a broadcast
/// receiver carrying every later snapshot.
///
/// A lagging subscriber skips the snapshots it missed; the next one it
/// receives is complete, so nothing is lost but intermediate states.
pub fn snapshot_stream(
    initial: Snapshot,
    receiver: broadcast::Receiver<Snapshot>,
) -> SnapshotStream {
    let updates = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(snapshot) => return Some((Ok(snapshot), receiver)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber lagged, skipped {} snapshot(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    stream::once(async move { Ok(initial) })
        .chain(updates)
        .boxed()
}
