//! Pantry Core Library
//!
//! Item model, store abstractions, and the synchronization logic that keeps
//! a local item list mirrored from a remote document collection.

pub mod blob;
pub mod error;
pub mod models;
pub mod recipe;
pub mod session;
pub mod store;
pub mod sync;

pub use error::{PantryError, RecipeError, StoreError, ValidationError};
pub use models::{ImageUpload, Item, ItemDraft, ItemUpdate, NewItem};
pub use recipe::{build_prompt, suggest_recipe, ChatCompletionsClient, RecipeService};
pub use session::{PantrySession, SessionStatus};
pub use store::{BlobStore, DocumentStore, MemoryBlobStore, MemoryDocumentStore, Snapshot};
pub use sync::ItemSync;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
