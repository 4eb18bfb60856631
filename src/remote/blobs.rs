use async_trait::async_trait;
use pantry_core::{BlobStore, StoreError};
use reqwest::{header, StatusCode};

use super::{build_http_url, connection_error, error_message};
use crate::server::routes::UrlResponse;

/// Image blob store served by `pantry-server`.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    server_url: String,
    http: reqwest::Client,
}

impl HttpBlobStore {
    pub fn new(server_url: &str) -> Self {
        Self {
            server_url: build_http_url(server_url),
            http: reqwest::Client::new(),
        }
    }

    /// Object URL with the whole path percent-encoded as one segment.
    fn object_url(&self, route: &str, path: &str) -> String {
        format!("{}/{}/{}", self.server_url, route, urlencoding::encode(path))
    }

    async fn check(response: reqwest::Response, path: &str) -> Result<reqwest::Response, StoreError> {
        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(StoreError::BlobNotFound(path.to_string())),
            StatusCode::BAD_REQUEST => Err(StoreError::InvalidPath(path.to_string())),
            StatusCode::PAYLOAD_TOO_LARGE => Err(StoreError::Backend(format!(
                "Image {} is larger than the server's upload limit",
                path
            ))),
            _ => Err(StoreError::Backend(error_message(response).await)),
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut request = self.http.put(self.object_url("o", path)).body(bytes);
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        let response = request.send().await.map_err(connection_error)?;
        Self::check(response, path).await?;
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, StoreError> {
        let response = self
            .http
            .get(self.object_url("url", path))
            .send()
            .await
            .map_err(connection_error)?;

        let body: UrlResponse = Self::check(response, path)
            .await?
            .json()
            .await
            .map_err(connection_error)?;
        Ok(body.url)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .http
            .get(self.object_url("o", path))
            .send()
            .await
            .map_err(connection_error)?;

        let bytes = Self::check(response, path)
            .await?
            .bytes()
            .await
            .map_err(connection_error)?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.object_url("o", path))
            .send()
            .await
            .map_err(connection_error)?;
        Self::check(response, path).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let response = self
            .http
            .get(format!("{}/o", self.server_url))
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(connection_error)?;

        Self::check(response, prefix)
            .await?
            .json()
            .await
            .map_err(connection_error)
    }
}
