//! In-process store implementations.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{snapshot_stream, BlobStore, DocumentStore, Snapshot, SnapshotStream, SUBSCRIBER_BUFFER};
use crate::blob;
use crate::error::StoreError;
use crate::models::{Item, ItemUpdate, NewItem};

/// Document store held entirely in memory.
///
/// Every mutation publishes the full collection to all subscribers while the
/// collection lock is held, so subscribers observe mutations in write order.
pub struct MemoryDocumentStore {
    items: Mutex<Vec<Item>>,
    hub: broadcast::Sender<Snapshot>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (hub, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            items: Mutex::new(Vec::new()),
            hub,
        }
    }

    /// Creates a store pre-populated with items, keeping their ids.
    pub fn with_items(items: Vec<Item>) -> Self {
        let store = Self::new();
        *store.lock() = items;
        store
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Item>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, items: &[Item]) {
        // No subscribers is not an error
        let _ = self.hub.send(items.to_vec());
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, item: NewItem) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        let mut items = self.lock();
        items.push(Item::from_new(id.clone(), item));
        self.publish(&items);
        Ok(id)
    }

    async fn update(&self, id: &str, update: &ItemUpdate) -> Result<(), StoreError> {
        let mut items = self.lock();
        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        update.apply_to(item);
        self.publish(&items);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|i| i.id != id);
        if items.len() != before {
            self.publish(&items);
        }
        Ok(())
    }

    async fn query_all(&self) -> Result<Snapshot, StoreError> {
        Ok(self.lock().clone())
    }

    async fn subscribe(&self) -> Result<SnapshotStream, StoreError> {
        let items = self.lock();
        let receiver = self.hub.subscribe();
        Ok(snapshot_stream(items.clone(), receiver))
    }
}

/// Blob store held entirely in memory.
pub struct MemoryBlobStore {
    base_url: String,
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            blobs: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        blob::validate_path(path)?;
        self.lock().insert(path.to_string(), bytes);
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, StoreError> {
        if !self.contains(path) {
            return Err(StoreError::BlobNotFound(path.to_string()));
        }
        Ok(blob::retrieval_url(&self.base_url, path))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.lock()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::BlobNotFound(path.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn new_item(name: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            quantity: 1.0,
            unit: "cans".to_string(),
            image_url: String::new(),
            image_path: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let store = MemoryDocumentStore::new();
        let a = store.create(new_item("Beans")).await.unwrap();
        let b = store.create(new_item("Beans")).await.unwrap();
        assert!(!a.is_empty());
        assert_ne!(a, b);
        assert_eq!(store.query_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryDocumentStore::new();
        let update = ItemUpdate {
            quantity: Some(3.0),
            ..Default::default()
        };
        let result = store.update("missing", &update).await;
        assert_eq!(result, Err(StoreError::NotFound("missing".to_string())));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryDocumentStore::new();
        let id = store.create(new_item("Beans")).await.unwrap();
        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(store.query_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_pushes_full_snapshots() {
        let store = MemoryDocumentStore::new();
        store.create(new_item("Rice")).await.unwrap();

        let mut snapshots = store.subscribe().await.unwrap();
        assert_eq!(snapshots.next().await.unwrap().unwrap().len(), 1);

        let id = store.create(new_item("Beans")).await.unwrap();
        let snapshot = snapshots.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 2);

        store.delete(&id).await.unwrap();
        let snapshot = snapshots.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "Rice");
    }

    #[tokio::test]
    async fn test_blob_roundtrip() {
        let store = MemoryBlobStore::new("https://store");
        store
            .upload("images/x_rice.png", vec![1, 2], Some("image/png"))
            .await
            .unwrap();

        let url = store.download_url("images/x_rice.png").await.unwrap();
        assert_eq!(url, "https://store/o/images%2Fx_rice.png?alt=media");
        assert_eq!(store.download("images/x_rice.png").await.unwrap(), vec![1, 2]);
        assert_eq!(store.list("images/").await.unwrap(), vec!["images/x_rice.png"]);

        store.delete("images/x_rice.png").await.unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.delete("images/x_rice.png").await,
            Err(StoreError::BlobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blob_upload_rejects_bad_path() {
        let store = MemoryBlobStore::default();
        let result = store.upload("../escape", vec![], None).await;
        assert!(matches!(result, Err(StoreError::InvalidPath(_))));
    }
}
