//! Item synchronization core.
//!
//! [`ItemSync`] keeps an in-memory mirror of the `items` collection and
//! performs the compound operations that touch both the document store and
//! the blob store.
//!
//! The mirror is only ever replaced wholesale from a subscription snapshot.
//! Mutating calls write to the stores and wait for the change to come back
//! through the subscription; the single exception is [`ItemSync::delete`],
//! which drops the item from the local list as soon as it is called.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::blob;
use crate::error::{PantryError, StoreError};
use crate::models::{ImageUpload, Item, ItemDraft, ItemUpdate};
use crate::store::{BlobStore, DocumentStore, Snapshot};

/// Local view of the collection plus the active search filter.
#[derive(Debug, Default)]
struct ListState {
    items: Vec<Item>,
    query: String,
    filtered: Vec<Item>,
}

impl ListState {
    fn refilter(&mut self) {
        self.filtered = filter_by_name(&self.items, &self.query);
    }
}

/// Synchronization core bound to one document store and one blob store.
pub struct ItemSync {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    state: Arc<RwLock<ListState>>,
    /// Count of snapshots applied so far.
    applied: Arc<watch::Sender<u64>>,
    /// Value of `applied` when the current subscription was opened.
    baseline: AtomicU64,
    /// Whether the current subscription is still delivering.
    open: Arc<AtomicBool>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl ItemSync {
    pub fn new(documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        let (applied, _) = watch::channel(0);
        Self {
            documents,
            blobs,
            state: Arc::new(RwLock::new(ListState::default())),
            applied: Arc::new(applied),
            baseline: AtomicU64::new(0),
            open: Arc::new(AtomicBool::new(false)),
            subscription: Mutex::new(None),
        }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ListState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ListState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Subscription
    // ------------------------------------------------------------------

    /// Opens the standing subscription and starts applying snapshots.
    ///
    /// Replaces any subscription that is already running.
    pub async fn activate(&self) -> Result<(), PantryError> {
        let mut snapshots = self.documents.subscribe().await?;
        self.deactivate();
        self.baseline
            .store(*self.applied.borrow(), Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);

        let state = Arc::clone(&self.state);
        let applied = Arc::clone(&self.applied);
        let open = Arc::clone(&self.open);
        let handle = tokio::spawn(async move {
            while let Some(next) = snapshots.next().await {
                match next {
                    Ok(snapshot) => {
                        debug!("Applying snapshot of {} item(s)", snapshot.len());
                        replace_items(&state, snapshot);
                        applied.send_modify(|n| *n += 1);
                    }
                    Err(e) => {
                        warn!("Item subscription failed: {}", e);
                        break;
                    }
                }
            }
            open.store(false, Ordering::SeqCst);
            // Wake anyone waiting for a first snapshot
            applied.send_modify(|_| {});
            debug!("Item subscription ended");
        });

        *self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!("Subscribed to item collection");
        Ok(())
    }

    /// Cancels the subscription. No further snapshots are applied.
    pub fn deactivate(&self) {
        let handle = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            self.open.store(false, Ordering::SeqCst);
            self.applied.send_modify(|_| {});
            info!("Unsubscribed from item collection");
        }
    }

    /// Whether a subscription is open and still delivering snapshots.
    pub fn is_active(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Waits until a snapshot has been applied since the last `activate`.
    ///
    /// Returns an error if the subscription ends before delivering one.
    pub async fn wait_for_snapshot(&self) -> Result<(), PantryError> {
        let baseline = self.baseline.load(Ordering::SeqCst);
        let mut receiver = self.applied.subscribe();
        loop {
            if *receiver.borrow_and_update() > baseline {
                return Ok(());
            }
            if !self.is_active() {
                return Err(StoreError::Connection(
                    "Subscription ended before the first snapshot".to_string(),
                )
                .into());
            }
            // The sender lives as long as `self`
            let _ = receiver.changed().await;
        }
    }

    /// Receiver that changes every time a snapshot is applied.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.applied.subscribe()
    }

    /// Replaces the local list with `snapshot`, discarding prior state.
    pub fn apply_snapshot(&self, snapshot: Snapshot) {
        replace_items(&self.state, snapshot);
        self.applied.send_modify(|n| *n += 1);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Current mirror of the collection.
    pub fn items(&self) -> Vec<Item> {
        self.read_state().items.clone()
    }

    /// Current filtered view. With an empty query this is the full list.
    pub fn filtered_items(&self) -> Vec<Item> {
        self.read_state().filtered.clone()
    }

    pub fn query(&self) -> String {
        self.read_state().query.clone()
    }

    pub fn find(&self, id: &str) -> Option<Item> {
        self.read_state().items.iter().find(|i| i.id == id).cloned()
    }

    /// Filters the local list by case-insensitive substring match on name
    /// and records `query` as the active filter. Never touches a store.
    pub fn search(&self, query: &str) -> Vec<Item> {
        let mut state = self.write_state();
        state.query = query.to_string();
        state.refilter();
        state.filtered.clone()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Uploads the image, then creates the document referencing it.
    ///
    /// The new item is not added locally; it arrives with the next snapshot.
    /// Returns the id the document store assigned.
    pub async fn create(
        &self,
        draft: &ItemDraft,
        image: Option<&ImageUpload>,
    ) -> Result<String, PantryError> {
        let image = draft.validate(image)?;
        let path = blob::new_image_path(&image.filename);

        self.blobs
            .upload(&path, image.bytes.clone(), image.content_type.as_deref())
            .await?;

        let image_url = self.blobs.download_url(&path).await.map_err(|e| {
            warn!("Uploaded blob {} left orphaned: {}", path, e);
            e
        })?;

        let new_item = draft.clone().into_new_item(image_url, path.clone());
        let id = self.documents.create(new_item).await.map_err(|e| {
            warn!("Uploaded blob {} left orphaned: {}", path, e);
            e
        })?;

        info!("Created item {} ({})", id, draft.name.trim());
        Ok(id)
    }

    /// Applies a partial update of name, quantity, or unit.
    pub async fn update(&self, id: &str, update: &ItemUpdate) -> Result<(), PantryError> {
        update.validate()?;
        self.documents.update(id, update).await?;
        info!("Updated item {}", id);
        Ok(())
    }

    /// Deletes the document, then its image blob if `image_url` is set.
    ///
    /// The item leaves the local list and filtered view before any remote
    /// call is made. There is no rollback: if the blob delete fails the
    /// document stays deleted and the blob is orphaned.
    pub async fn delete(&self, id: &str, image_url: &str) -> Result<(), PantryError> {
        let removed = self.remove_local(id);

        self.documents.delete(id).await?;
        info!("Deleted item {}", id);

        if image_url.is_empty() {
            return Ok(());
        }

        let path = removed
            .map(|item| item.image_path)
            .filter(|p| !p.is_empty())
            .or_else(|| blob::path_from_url(image_url))
            .ok_or_else(|| {
                warn!("Cannot resolve blob path for item {} from {}", id, image_url);
                StoreError::InvalidPath(image_url.to_string())
            })?;

        self.blobs.delete(&path).await.map_err(|e| {
            warn!("Blob {} left orphaned after deleting item {}: {}", path, id, e);
            e
        })?;

        Ok(())
    }

    /// Deletes image blobs that no document references.
    ///
    /// Reads the collection fresh from the store rather than using the local
    /// mirror. Must not run while a create is between its upload and its
    /// document write, or that upload is treated as orphaned.
    pub async fn reconcile(&self) -> Result<Vec<String>, PantryError> {
        let documents = self.documents.query_all().await?;
        let referenced: HashSet<String> = documents.iter().filter_map(Item::blob_path).collect();

        let mut removed = Vec::new();
        for path in self.blobs.list(blob::IMAGE_PREFIX).await? {
            if referenced.contains(&path) {
                continue;
            }
            self.blobs.delete(&path).await?;
            info!("Removed orphaned blob {}", path);
            removed.push(path);
        }

        Ok(removed)
    }

    fn remove_local(&self, id: &str) -> Option<Item> {
        let mut state = self.write_state();
        let removed = state
            .items
            .iter()
            .position(|i| i.id == id)
            .map(|index| state.items.remove(index));
        state.filtered.retain(|i| i.id != id);
        removed
    }
}

impl Drop for ItemSync {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Case-insensitive substring match of `query` against item names.
///
/// An empty query matches every item.
pub fn filter_by_name(items: &[Item], query: &str) -> Vec<Item> {
    let query_lower = query.to_lowercase();
    items
        .iter()
        .filter(|i| i.name.to_lowercase().contains(&query_lower))
        .cloned()
        .collect()
}

fn replace_items(state: &RwLock<ListState>, snapshot: Snapshot) {
    let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
    state.items = snapshot;
    state.refilter();
}
