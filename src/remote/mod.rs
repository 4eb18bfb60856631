//! HTTP clients for `pantry-server`, implementing the core store traits.

mod blobs;
mod documents;

pub use blobs::HttpBlobStore;
pub use documents::HttpDocumentStore;

use pantry_core::StoreError;

/// Normalizes a server URL to an http(s) base without a trailing slash.
pub fn build_http_url(server_url: &str) -> String {
    let url = server_url.trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if !url.starts_with("http://") && !url.starts_with("https://") {
        format!("http://{}", url)
    } else {
        url.to_string()
    }
}

/// Builds a WebSocket URL for `path` on the server.
pub fn build_ws_url(server_url: &str, path: &str) -> String {
    let base = build_http_url(server_url);
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base
    };
    format!("{}{}", base, path)
}

fn connection_error(e: reqwest::Error) -> StoreError {
    StoreError::Connection(e.to_string())
}

/// Reads the server's error message from a failed response.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<crate::server::routes::ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => format!("Server returned status {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{router, AppState};
    use axum::extract::ws::{Message, WebSocketUpgrade};
    use axum::routing::get;
    use axum::Router;
    use futures::StreamExt;
    use pantry_core::{
        blob, BlobStore, DocumentStore, ImageUpload, ItemDraft, ItemSync, MemoryBlobStore,
        MemoryDocumentStore,
    };
    use std::sync::Arc;
    use std::time::Duration;

    /// Serves `app` on an ephemeral local port and returns its base URL.
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_item_sync_through_server() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let blobs = Arc::new(MemoryBlobStore::new("http://pantry.test"));
        let server_url = serve(router(AppState::new(documents.clone(), blobs.clone()))).await;

        let sync = ItemSync::new(
            Arc::new(HttpDocumentStore::new(&server_url)),
            Arc::new(HttpBlobStore::new(&server_url)),
        );
        sync.activate().await.unwrap();
        sync.wait_for_snapshot().await.unwrap();
        assert!(sync.items().is_empty());

        let mut changes = sync.changes();
        let draft = ItemDraft::new("Rice", 2.0, "bags");
        let photo = ImageUpload::new("rice pack.png", vec![1, 2, 3]).with_content_type("image/png");
        let id = sync.create(&draft, Some(&photo)).await.unwrap();

        // The new item only reaches the mirror through the subscription
        tokio::time::timeout(Duration::from_secs(5), async {
            while sync.find(&id).is_none() {
                changes.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        let item = sync.find(&id).unwrap();
        assert_eq!(item.name, "Rice");
        assert!(blobs.contains(&item.image_path));
        assert_eq!(
            item.image_url,
            blob::retrieval_url("http://pantry.test", &item.image_path)
        );

        sync.delete(&id, &item.image_url).await.unwrap();
        assert!(sync.find(&id).is_none());
        assert!(documents.query_all().await.unwrap().is_empty());
        assert!(!blobs.contains(&item.image_path));

        sync.deactivate();
    }

    #[tokio::test]
    async fn test_subscription_ends_on_close() {
        let app = Router::new().route(
            "/items/subscribe",
            get(|ws: WebSocketUpgrade| async move {
                ws.on_upgrade(|mut socket| async move {
                    let _ = socket.send(Message::Text("[]".into())).await;
                    let _ = socket.send(Message::Close(None)).await;
                })
            }),
        );
        let server_url = serve(app).await;

        let store = HttpDocumentStore::new(&server_url);
        let mut snapshots = store.subscribe().await.unwrap();
        assert_eq!(snapshots.next().await, Some(Ok(Vec::new())));
        assert!(snapshots.next().await.is_none());
    }

    #[tokio::test]
    async fn test_upload_over_server_limit() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let blobs = Arc::new(MemoryBlobStore::new("http://pantry.test"));
        let state = AppState::new(documents, blobs.clone()).with_max_upload_bytes(16);
        let server_url = serve(router(state)).await;

        let store = HttpBlobStore::new(&server_url);
        let err = store
            .upload("images/x_photo.jpg", vec![0u8; 64], Some("image/jpeg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("upload limit"));
        assert!(!blobs.contains("images/x_photo.jpg"));
    }

    #[test]
    fn test_build_http_url() {
        assert_eq!(build_http_url("http://localhost:8080"), "http://localhost:8080");
        assert_eq!(build_http_url("http://localhost:8080/"), "http://localhost:8080");
        assert_eq!(build_http_url("ws://localhost:8080"), "http://localhost:8080");
        assert_eq!(
            build_http_url("wss://pantry.example.com"),
            "https://pantry.example.com"
        );
        assert_eq!(build_http_url("localhost:8080"), "http://localhost:8080");
    }

    #[test]
    fn test_build_ws_url_with_http() {
        assert_eq!(
            build_ws_url("http://localhost:8080", "/items/subscribe"),
            "ws://localhost:8080/items/subscribe"
        );
    }

    #[test]
    fn test_build_ws_url_with_https() {
        assert_eq!(
            build_ws_url("https://pantry.example.com", "/items/subscribe"),
            "wss://pantry.example.com/items/subscribe"
        );
    }

    #[test]
    fn test_build_ws_url_bare_host() {
        assert_eq!(
            build_ws_url("localhost:8080", "/items/subscribe"),
            "ws://localhost:8080/items/subscribe"
        );
    }
}
