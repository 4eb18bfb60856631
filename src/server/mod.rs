//! Server-side modules for `pantry-server`.

pub mod routes;
pub mod storage;

pub use routes::{router, AppState, DEFAULT_MAX_UPLOAD_BYTES};
pub use storage::{BlobStorageError, FsBlobStore};
