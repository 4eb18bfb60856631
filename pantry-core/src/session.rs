//! Presentation-facing session state.
//!
//! Holds the form state a user interface needs around [`ItemSync`]: the new
//! item draft and its attached image, the item being edited, the recipe
//! suggestion, and busy/error flags for the add and delete flows.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{PantryError, RecipeError, ValidationError};
use crate::models::{ImageUpload, Item, ItemDraft, ItemUpdate};
use crate::recipe::{suggest_recipe, RecipeService};
use crate::sync::ItemSync;

/// Busy and error flags observed by the interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub adding: bool,
    pub deleting: bool,
    pub generating: bool,
    /// Message for the last failed operation, cleared by the next success.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone)]
struct EditState {
    original: Item,
    fields: ItemDraft,
}

pub struct PantrySession {
    sync: Arc<ItemSync>,
    recipes: Option<Arc<dyn RecipeService>>,
    draft: ItemDraft,
    image: Option<ImageUpload>,
    editing: Option<EditState>,
    recipe: Option<String>,
    status: watch::Sender<SessionStatus>,
}

impl PantrySession {
    pub fn new(sync: Arc<ItemSync>, recipes: Option<Arc<dyn RecipeService>>) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            sync,
            recipes,
            draft: ItemDraft::default(),
            image: None,
            editing: None,
            recipe: None,
            status,
        }
    }

    pub fn sync(&self) -> &Arc<ItemSync> {
        &self.sync
    }

    pub fn items(&self) -> Vec<Item> {
        self.sync.items()
    }

    pub fn filtered_items(&self) -> Vec<Item> {
        self.sync.filtered_items()
    }

    pub fn search(&self, text: &str) -> Vec<Item> {
        self.sync.search(text)
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn status_changes(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    fn set_status(&self, update: impl FnOnce(&mut SessionStatus)) {
        self.status.send_modify(update);
    }

    fn record_outcome<T>(&self, result: &Result<T, PantryError>) {
        let message = result.as_ref().err().map(PantryError::user_message);
        self.set_status(|s| s.last_error = message);
    }

    // ------------------------------------------------------------------
    // New item form
    // ------------------------------------------------------------------

    pub fn draft(&self) -> &ItemDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut ItemDraft {
        &mut self.draft
    }

    pub fn attach_image(&mut self, image: ImageUpload) {
        self.image = Some(image);
    }

    pub fn image(&self) -> Option<&ImageUpload> {
        self.image.as_ref()
    }

    /// Creates an item from the draft and attached image.
    ///
    /// On success the draft returns to its empty defaults and the image is
    /// detached; the item itself shows up with the next snapshot.
    pub async fn add_item(&mut self) -> Result<String, PantryError> {
        self.set_status(|s| s.adding = true);
        let result = self.sync.create(&self.draft, self.image.as_ref()).await;
        self.set_status(|s| s.adding = false);
        self.record_outcome(&result);

        let id = result?;
        self.draft = ItemDraft::default();
        self.image = None;
        Ok(id)
    }

    pub async fn delete_item(&self, id: &str, image_url: &str) -> Result<(), PantryError> {
        self.set_status(|s| s.deleting = true);
        let result = self.sync.delete(id, image_url).await;
        self.set_status(|s| s.deleting = false);
        self.record_outcome(&result);
        result
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    pub fn start_editing(&mut self, item: &Item) {
        self.editing = Some(EditState {
            original: item.clone(),
            fields: ItemDraft::from_item(item),
        });
    }

    pub fn editing_id(&self) -> Option<&str> {
        self.editing.as_ref().map(|e| e.original.id.as_str())
    }

    pub fn editing_mut(&mut self) -> Option<&mut ItemDraft> {
        self.editing.as_mut().map(|e| &mut e.fields)
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Saves the fields changed since [`start_editing`](Self::start_editing).
    ///
    /// Leaves edit mode on success and returns whether an update was sent.
    /// Saving with nothing changed leaves edit mode without a remote call.
    pub async fn save_edit(&mut self) -> Result<bool, PantryError> {
        let edit = self.editing.as_ref().ok_or(ValidationError::NotEditing)?;
        let update = ItemUpdate::diff(&edit.original, &edit.fields);

        if update.is_empty() {
            self.editing = None;
            return Ok(false);
        }

        let result = self.sync.update(&edit.original.id, &update).await;
        self.record_outcome(&result);
        result?;

        self.editing = None;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Recipe
    // ------------------------------------------------------------------

    pub fn recipe(&self) -> Option<&str> {
        self.recipe.as_deref()
    }

    /// Asks the recipe service for a suggestion using every current item.
    ///
    /// On failure no recipe is held.
    pub async fn generate_recipe(&mut self) -> Result<String, PantryError> {
        let service = self
            .recipes
            .clone()
            .ok_or(PantryError::Recipe(RecipeError::NotConfigured))?;

        self.set_status(|s| s.generating = true);
        let result = suggest_recipe(service.as_ref(), &self.sync.items()).await;
        self.set_status(|s| s.generating = false);
        self.record_outcome(&result);

        match result {
            Ok(text) => {
                self.recipe = Some(text.clone());
                Ok(text)
            }
            Err(e) => {
                self.recipe = None;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BlobStore, DocumentStore, MemoryBlobStore, MemoryDocumentStore};
    use async_trait::async_trait;

    struct CannedRecipes(Result<String, RecipeError>);

    #[async_trait]
    impl RecipeService for CannedRecipes {
        async fn complete(&self, _prompt: &str) -> Result<String, RecipeError> {
            self.0.clone()
        }
    }

    fn item(id: &str, name: &str, quantity: f64) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            quantity,
            unit: "bags".to_string(),
            image_url: String::new(),
            image_path: String::new(),
        }
    }

    fn session_with(
        items: Vec<Item>,
        recipes: Option<Arc<dyn RecipeService>>,
    ) -> (PantrySession, Arc<MemoryDocumentStore>, Arc<MemoryBlobStore>) {
        let documents = Arc::new(MemoryDocumentStore::with_items(items.clone()));
        let blobs = Arc::new(MemoryBlobStore::new("https://store"));
        let sync = Arc::new(ItemSync::new(documents.clone(), blobs.clone()));
        sync.apply_snapshot(items);
        (PantrySession::new(sync, recipes), documents, blobs)
    }

    #[tokio::test]
    async fn test_add_item_resets_draft_and_image() {
        let (mut session, documents, _) = session_with(Vec::new(), None);
        *session.draft_mut() = ItemDraft::new("Rice", 2.0, "bags");
        session.attach_image(ImageUpload::new("rice.png", vec![1, 2, 3]));

        session.add_item().await.unwrap();

        assert!(session.draft().is_empty());
        assert!(session.image().is_none());
        assert_eq!(documents.query_all().await.unwrap().len(), 1);
        assert_eq!(session.status(), SessionStatus::default());
    }

    #[tokio::test]
    async fn test_add_item_validation_keeps_draft() {
        let (mut session, documents, blobs) = session_with(Vec::new(), None);
        *session.draft_mut() = ItemDraft::new("Rice", 2.0, "");
        session.attach_image(ImageUpload::new("rice.png", vec![1]));

        let err = session.add_item().await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(session.draft().name, "Rice");
        assert!(session.image().is_some());
        assert_eq!(
            session.status().last_error.as_deref(),
            Some("Unit cannot be empty")
        );
        assert!(documents.query_all().await.unwrap().is_empty());
        assert!(blobs.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_edit_sends_changed_fields() {
        let rice = item("abc", "Rice", 2.0);
        let (mut session, documents, _) = session_with(vec![rice.clone()], None);

        session.start_editing(&rice);
        assert_eq!(session.editing_id(), Some("abc"));
        session.editing_mut().unwrap().quantity = 5.0;
        assert!(session.save_edit().await.unwrap());

        assert!(session.editing_id().is_none());
        let stored = documents.query_all().await.unwrap();
        assert_eq!(stored[0].quantity, 5.0);
        assert_eq!(stored[0].name, "Rice");
        assert_eq!(stored[0].unit, "bags");
    }

    #[tokio::test]
    async fn test_save_edit_unchanged_sends_nothing() {
        // The item is absent from the store, so any update would fail
        let (mut session, documents, _) = session_with(Vec::new(), None);
        let rice = item("abc", "Rice", 2.0);

        session.start_editing(&rice);
        session.editing_mut().unwrap().quantity = 2.0;

        assert!(!session.save_edit().await.unwrap());
        assert!(session.editing_id().is_none());
        assert!(documents.query_all().await.unwrap().is_empty());
        assert_eq!(session.status(), SessionStatus::default());
    }

    #[tokio::test]
    async fn test_save_edit_requires_editing() {
        let (mut session, _, _) = session_with(Vec::new(), None);
        let err = session.save_edit().await.unwrap_err();
        assert!(matches!(
            err,
            PantryError::Validation(ValidationError::NotEditing)
        ));
    }

    #[tokio::test]
    async fn test_failed_save_stays_in_edit_mode() {
        let (mut session, _, _) = session_with(Vec::new(), None);
        let ghost = item("gone", "Ghost", 1.0);
        session.start_editing(&ghost);
        session.editing_mut().unwrap().name = "Spirit".to_string();

        assert!(session.save_edit().await.is_err());
        assert_eq!(session.editing_id(), Some("gone"));
        assert!(session.status().last_error.is_some());
    }

    #[tokio::test]
    async fn test_delete_item_updates_local_views() {
        let (session, _, _) = session_with(
            vec![item("abc", "Rice", 2.0), item("def", "Beans", 1.0)],
            None,
        );
        session.search("r");

        session.delete_item("abc", "").await.unwrap();
        assert_eq!(session.items().len(), 1);
        assert!(session.filtered_items().is_empty());
        assert!(!session.status().deleting);
    }

    #[tokio::test]
    async fn test_generate_recipe_holds_text() {
        let recipes: Arc<dyn RecipeService> =
            Arc::new(CannedRecipes(Ok("Rice and beans".to_string())));
        let (mut session, _, _) = session_with(
            vec![item("1", "Rice", 2.0), item("2", "Beans", 1.0)],
            Some(recipes),
        );

        let text = session.generate_recipe().await.unwrap();
        assert_eq!(text, "Rice and beans");
        assert_eq!(session.recipe(), Some("Rice and beans"));
    }

    #[tokio::test]
    async fn test_generate_recipe_failure_clears_recipe() {
        let recipes: Arc<dyn RecipeService> =
            Arc::new(CannedRecipes(Err(RecipeError::Http("timeout".to_string()))));
        let (mut session, _, _) = session_with(vec![item("1", "Rice", 2.0)], Some(recipes));

        assert!(session.generate_recipe().await.is_err());
        assert!(session.recipe().is_none());
        assert!(session.status().last_error.is_some());
        assert!(!session.status().generating);
    }

    #[tokio::test]
    async fn test_generate_recipe_without_service() {
        let (mut session, _, _) = session_with(vec![item("1", "Rice", 2.0)], None);
        let err = session.generate_recipe().await.unwrap_err();
        assert!(matches!(
            err,
            PantryError::Recipe(RecipeError::NotConfigured)
        ));
    }
}
