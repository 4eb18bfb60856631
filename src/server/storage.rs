//! Filesystem blob storage for item images.
//!
//! Blobs are stored under the blob directory at their path:
//! ```text
//! <BLOB_DIR>/
//!   images/
//!     <token>_<filename>
//! ```
//!
//! Writes go to a hidden `.upload-<name>` file next to the target and are
//! renamed into place.

use async_trait::async_trait;
use pantry_core::{blob, BlobStore, StoreError};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const TEMP_PREFIX: &str = ".upload-";

/// Errors that can occur during blob storage operations.
#[derive(Debug)]
pub enum BlobStorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// Path is empty, absolute, or escapes the blob directory.
    InvalidPath(String),
    /// No blob at the path.
    NotFound(String),
}

impl std::fmt::Display for BlobStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobStorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            BlobStorageError::InvalidPath(path) => write!(f, "Invalid blob path: {}", path),
            BlobStorageError::NotFound(path) => write!(f, "Blob not found: {}", path),
        }
    }
}

impl std::error::Error for BlobStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobStorageError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

impl From<BlobStorageError> for StoreError {
    fn from(e: BlobStorageError) -> Self {
        match e {
            BlobStorageError::InvalidPath(path) => StoreError::InvalidPath(path),
            BlobStorageError::NotFound(path) => StoreError::BlobNotFound(path),
            e @ BlobStorageError::IoError(..) => StoreError::Backend(e.to_string()),
        }
    }
}

/// Blob store on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_url: String,
}

impl FsBlobStore {
    /// Creates a store rooted at `root` whose retrieval URLs start with
    /// `public_url`.
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the full path for a blob after validating it.
    fn blob_file(&self, path: &str) -> Result<PathBuf, BlobStorageError> {
        blob::validate_path(path).map_err(|_| BlobStorageError::InvalidPath(path.to_string()))?;
        Ok(path.split('/').fold(self.root.clone(), |acc, part| acc.join(part)))
    }

    /// Writes a blob, replacing any existing one.
    pub fn save(&self, path: &str, bytes: &[u8]) -> Result<(), BlobStorageError> {
        let file_path = self.blob_file(path)?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BlobStorageError::IoError(parent.to_path_buf(), e))?;
        }

        // Write atomically using temp file + rename
        let temp_path = temp_file(&file_path);

        let mut file = File::create(&temp_path)
            .map_err(|e| BlobStorageError::IoError(temp_path.clone(), e))?;

        file.write_all(bytes)
            .map_err(|e| BlobStorageError::IoError(temp_path.clone(), e))?;

        file.sync_all()
            .map_err(|e| BlobStorageError::IoError(temp_path.clone(), e))?;

        fs::rename(&temp_path, &file_path)
            .map_err(|e| BlobStorageError::IoError(file_path, e))?;

        Ok(())
    }

    /// Reads a blob.
    pub fn load(&self, path: &str) -> Result<Vec<u8>, BlobStorageError> {
        let file_path = self.blob_file(path)?;

        match fs::read(&file_path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BlobStorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(BlobStorageError::IoError(file_path, e)),
        }
    }

    /// Checks if a blob exists.
    pub fn exists(&self, path: &str) -> Result<bool, BlobStorageError> {
        Ok(self.blob_file(path)?.is_file())
    }

    /// Removes a blob.
    pub fn remove(&self, path: &str) -> Result<(), BlobStorageError> {
        let file_path = self.blob_file(path)?;

        match fs::remove_file(&file_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BlobStorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(BlobStorageError::IoError(file_path, e)),
        }
    }

    /// Lists blob paths starting with `prefix`, sorted.
    pub fn list_paths(&self, prefix: &str) -> Result<Vec<String>, BlobStorageError> {
        let mut paths = Vec::new();
        if self.root.is_dir() {
            collect(&self.root, "", &mut paths)?;
        }
        paths.retain(|p| p.starts_with(prefix));
        paths.sort();
        Ok(paths)
    }
}

/// Sibling of `file_path` that in-flight writes go to.
fn temp_file(file_path: &Path) -> PathBuf {
    let mut temp_name = std::ffi::OsString::from(TEMP_PREFIX);
    if let Some(name) = file_path.file_name() {
        temp_name.push(name);
    }
    file_path.with_file_name(temp_name)
}

fn collect(dir: &Path, relative: &str, out: &mut Vec<String>) -> Result<(), BlobStorageError> {
    let entries = fs::read_dir(dir).map_err(|e| BlobStorageError::IoError(dir.to_path_buf(), e))?;

    for entry in entries {
        let entry = entry.map_err(|e| BlobStorageError::IoError(dir.to_path_buf(), e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = if relative.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", relative, name)
        };

        let file_type = entry
            .file_type()
            .map_err(|e| BlobStorageError::IoError(entry.path(), e))?;
        if file_type.is_dir() {
            collect(&entry.path(), &path, out)?;
        } else if !name.starts_with(TEMP_PREFIX) {
            out.push(path);
        }
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        self.save(path, &bytes)?;
        tracing::debug!("Stored blob {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, StoreError> {
        if !self.exists(path)? {
            return Err(StoreError::BlobNotFound(path.to_string()));
        }
        Ok(blob::retrieval_url(&self.public_url, path))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        Ok(self.load(path)?)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.remove(path)?;
        tracing::debug!("Removed blob {}", path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.list_paths(prefix)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (FsBlobStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path(), "http://localhost:8080");
        (store, temp_dir)
    }

    #[test]
    fn test_rejects_traversal() {
        let (store, _temp) = setup();

        assert!(store.save("images/ok.png", b"x").is_ok());

        assert!(matches!(
            store.save("../evil", b"x"),
            Err(BlobStorageError::InvalidPath(_))
        ));
        assert!(matches!(
            store.save("images/../../evil", b"x"),
            Err(BlobStorageError::InvalidPath(_))
        ));
        assert!(matches!(
            store.save("/etc/passwd", b"x"),
            Err(BlobStorageError::InvalidPath(_))
        ));
        assert!(matches!(store.load(""), Err(BlobStorageError::InvalidPath(_))));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (store, temp) = setup();

        store.save("images/abc_rice.png", &[1, 2, 3]).unwrap();

        assert_eq!(store.load("images/abc_rice.png").unwrap(), vec![1, 2, 3]);
        assert!(temp.path().join("images").join("abc_rice.png").is_file());
        assert!(!temp.path().join("images").join(".upload-abc_rice.png").exists());
    }

    #[test]
    fn test_overwrite_existing() {
        let (store, _temp) = setup();

        store.save("images/a.png", b"one").unwrap();
        store.save("images/a.png", b"two").unwrap();

        assert_eq!(store.load("images/a.png").unwrap(), b"two".to_vec());
    }

    #[test]
    fn test_load_missing() {
        let (store, _temp) = setup();
        assert!(matches!(
            store.load("images/none.png"),
            Err(BlobStorageError::NotFound(_))
        ));
        assert!(!store.exists("images/none.png").unwrap());
    }

    #[test]
    fn test_list_paths_by_prefix() {
        let (store, _temp) = setup();

        store.save("images/b.png", b"b").unwrap();
        store.save("images/a.png", b"a").unwrap();
        store.save("other/c.txt", b"c").unwrap();

        assert_eq!(
            store.list_paths("images/").unwrap(),
            vec!["images/a.png", "images/b.png"]
        );
        assert_eq!(store.list_paths("").unwrap().len(), 3);
    }

    #[test]
    fn test_list_paths_keeps_tmp_extension() {
        let (store, temp) = setup();

        store.save("images/x_notes.tmp", b"n").unwrap();
        // Leftover from an interrupted write
        fs::write(temp.path().join("images").join(".upload-y_rice.png"), b"r").unwrap();

        assert_eq!(store.list_paths("images/").unwrap(), vec!["images/x_notes.tmp"]);
    }

    #[test]
    fn test_list_paths_empty_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().join("missing"), "http://localhost");
        assert!(store.list_paths("images/").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blob_store_delete_and_url() {
        let (store, _temp) = setup();

        store
            .upload("images/x_rice.png", vec![9], Some("image/png"))
            .await
            .unwrap();
        assert_eq!(
            store.download_url("images/x_rice.png").await.unwrap(),
            "http://localhost:8080/o/images%2Fx_rice.png?alt=media"
        );

        BlobStore::delete(&store, "images/x_rice.png").await.unwrap();
        assert_eq!(
            BlobStore::delete(&store, "images/x_rice.png").await,
            Err(StoreError::BlobNotFound("images/x_rice.png".to_string()))
        );
        assert_eq!(
            store.download_url("images/x_rice.png").await,
            Err(StoreError::BlobNotFound("images/x_rice.png".to_string()))
        );
    }
}
