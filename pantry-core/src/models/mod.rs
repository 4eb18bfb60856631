mod draft;
mod item;

pub use draft::{ImageUpload, ItemDraft, ItemUpdate};
pub use item::{Item, NewItem};
