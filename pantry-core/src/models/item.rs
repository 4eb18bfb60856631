use serde::{Deserialize, Serialize};
use std::fmt;

use super::draft::{validate_name, validate_quantity, validate_unit};
use crate::blob;
use crate::error::ValidationError;

/// A pantry item as stored in the `items` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub image_url: String,
    /// Canonical blob path; empty for documents written without one.
    #[serde(default)]
    pub image_path: String,
}

impl Item {
    pub fn from_new(id: impl Into<String>, item: NewItem) -> Self {
        Self {
            id: id.into(),
            name: item.name,
            quantity: item.quantity,
            unit: item.unit,
            image_url: item.image_url,
            image_path: item.image_path,
        }
    }

    /// Blob path of this item's image.
    ///
    /// Prefers the stored path and falls back to parsing the retrieval URL.
    pub fn blob_path(&self) -> Option<String> {
        if !self.image_path.is_empty() {
            return Some(self.image_path.clone());
        }
        if self.image_url.is_empty() {
            return None;
        }
        blob::path_from_url(&self.image_url)
    }

    pub fn has_image(&self) -> bool {
        !self.image_url.is_empty()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.quantity, self.unit, self.name)
    }
}

/// Document fields sent to the store on create. The store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub image_path: String,
}

impl NewItem {
    /// Checks the fields every stored item must satisfy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_quantity(self.quantity)?;
        validate_unit(&self.unit)
    }
}
