use serde::{Deserialize, Serialize};

use super::item::{Item, NewItem};
use crate::error::ValidationError;

/// The "new item" form state, before the store assigns an id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ItemDraft {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

impl ItemDraft {
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
        }
    }

    /// Draft pre-filled from an existing item, used for editing.
    pub fn from_item(item: &Item) -> Self {
        Self::new(item.name.clone(), item.quantity, item.unit.clone())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Checks the draft fields and the attached image in form order,
    /// returning the first failure.
    pub fn validate<'a>(
        &self,
        image: Option<&'a ImageUpload>,
    ) -> Result<&'a ImageUpload, ValidationError> {
        validate_name(&self.name)?;
        validate_quantity(self.quantity)?;
        validate_unit(&self.unit)?;
        image.ok_or(ValidationError::MissingImage)
    }

    pub fn into_new_item(self, image_url: String, image_path: String) -> NewItem {
        NewItem {
            name: self.name.trim().to_string(),
            quantity: self.quantity,
            unit: self.unit.trim().to_string(),
            image_url,
            image_path,
        }
    }
}

/// Partial field update. The image is never part of an update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ItemUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ItemUpdate {
    /// Update carrying only the fields of `edited` that differ from `original`.
    pub fn diff(original: &Item, edited: &ItemDraft) -> Self {
        Self {
            name: (edited.name != original.name).then(|| edited.name.clone()),
            quantity: (edited.quantity != original.quantity).then_some(edited.quantity),
            unit: (edited.unit != original.unit).then(|| edited.unit.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.quantity.is_none() && self.unit.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyUpdate);
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(quantity) = self.quantity {
            validate_quantity(quantity)?;
        }
        if let Some(unit) = &self.unit {
            validate_unit(unit)?;
        }
        Ok(())
    }

    /// Applies the update to an item in place.
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(unit) = &self.unit {
            item.unit = unit.clone();
        }
    }
}

/// An image file attached to a draft.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    /// Original filename, used in the blob path.
    pub filename: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

pub(super) fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

pub(super) fn validate_quantity(quantity: f64) -> Result<(), ValidationError> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(ValidationError::InvalidQuantity);
    }
    Ok(())
}

pub(super) fn validate_unit(unit: &str) -> Result<(), ValidationError> {
    if unit.trim().is_empty() {
        return Err(ValidationError::EmptyUnit);
    }
    Ok(())
}
