//! Blob path scheme and retrieval-URL helpers.
//!
//! Images live at `images/<token>_<original filename>`. Retrieval URLs have
//! the shape `<base>/o/<percent-encoded path>?alt=media`.

use uuid::Uuid;

use crate::error::StoreError;

/// Prefix under which all item images are stored.
pub const IMAGE_PREFIX: &str = "images/";

/// Marker separating the store base from the encoded object path in a URL.
const OBJECT_MARKER: &str = "/o/";

/// Builds the blob path for an image from a token and its original filename.
///
/// Only the final component of `filename` is kept.
pub fn image_path(token: &str, filename: &str) -> String {
    let name = filename
        .rsplit(&['/', '\\'][..])
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .unwrap_or("image");
    format!("{}{}_{}", IMAGE_PREFIX, token, name)
}

/// Builds a blob path with a freshly generated unique token, so two images
/// with the same source filename never collide.
pub fn new_image_path(filename: &str) -> String {
    image_path(&Uuid::new_v4().simple().to_string(), filename)
}

/// Builds the retrieval URL for a blob path.
pub fn retrieval_url(base_url: &str, path: &str) -> String {
    format!(
        "{}{}{}?alt=media",
        base_url.trim_end_matches('/'),
        OBJECT_MARKER,
        urlencoding::encode(path)
    )
}

/// Extracts the blob path from a retrieval URL.
///
/// Takes the segment between the object marker and the query string and
/// percent-decodes it. Returns `None` when the URL has no object segment.
pub fn path_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once(OBJECT_MARKER)?;
    let encoded = rest.split(&['?', '#'][..]).next().unwrap_or_default();
    if encoded.is_empty() {
        return None;
    }
    urlencoding::decode(encoded).ok().map(|p| p.into_owned())
}

/// Rejects blob paths that are empty, absolute, or escape their root.
pub fn validate_path(path: &str) -> Result<(), StoreError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.contains('\0')
        || path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}
