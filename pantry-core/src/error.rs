//! Error types shared by the store implementations and the sync core.

use thiserror::Error;

/// Input rejected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Item name cannot be empty")]
    EmptyName,
    #[error("Quantity must be a non-negative number")]
    InvalidQuantity,
    #[error("Unit cannot be empty")]
    EmptyUnit,
    #[error("An image must be attached")]
    MissingImage,
    #[error("Nothing to update. Provide at least one field.")]
    EmptyUpdate,
    #[error("No item is being edited")]
    NotEditing,
    #[error("No items to suggest a recipe from")]
    NoItems,
}

impl ValidationError {
    /// Name of the form field the error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::EmptyName => Some("name"),
            ValidationError::InvalidQuantity => Some("quantity"),
            ValidationError::EmptyUnit => Some("unit"),
            ValidationError::MissingImage => Some("image"),
            _ => None,
        }
    }
}

/// Failure of a document-store or blob-store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Blob not found: {0}")]
    BlobNotFound(String),
    #[error("Invalid blob path: {0}")]
    InvalidPath(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Failure of the recipe suggestion service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecipeError {
    #[error("Recipe service not configured. Add recipe.api_key to config.")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Recipe service returned status {0}: {1}")]
    Status(u16, String),
    #[error("Recipe service returned no choices")]
    EmptyResponse,
}

/// Top-level error for every operation of the sync core and the session.
#[derive(Debug, Error)]
pub enum PantryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Recipe error: {0}")]
    Recipe(#[from] RecipeError),
}

impl PantryError {
    /// Message shown inline to the user.
    ///
    /// Validation errors name the failing field; remote failures collapse to
    /// a generic message.
    pub fn user_message(&self) -> String {
        match self {
            PantryError::Validation(e) => e.to_string(),
            PantryError::Store(_) => "Something went wrong. Please try again.".to_string(),
            PantryError::Recipe(_) => "Could not generate a recipe. Please try again.".to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PantryError::Validation(_))
    }
}
