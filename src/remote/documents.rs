use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use pantry_core::store::SnapshotStream;
use pantry_core::{DocumentStore, ItemUpdate, NewItem, Snapshot, StoreError};
use reqwest::StatusCode;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{build_http_url, build_ws_url, connection_error, error_message};
use crate::server::routes::CreatedResponse;

/// `items` collection served by `pantry-server`.
#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    server_url: String,
    http: reqwest::Client,
}

impl HttpDocumentStore {
    pub fn new(server_url: &str) -> Self {
        Self {
            server_url: build_http_url(server_url),
            http: reqwest::Client::new(),
        }
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/items/{}", self.server_url, urlencoding::encode(id))
    }

    async fn check(response: reqwest::Response, id: &str) -> Result<reqwest::Response, StoreError> {
        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
            _ => Err(StoreError::Backend(error_message(response).await)),
        }
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn create(&self, item: NewItem) -> Result<String, StoreError> {
        let response = self
            .http
            .post(format!("{}/items", self.server_url))
            .json(&item)
            .send()
            .await
            .map_err(connection_error)?;

        let created: CreatedResponse = Self::check(response, "")
            .await?
            .json()
            .await
            .map_err(connection_error)?;
        Ok(created.id)
    }

    async fn update(&self, id: &str, update: &ItemUpdate) -> Result<(), StoreError> {
        let response = self
            .http
            .patch(self.item_url(id))
            .json(update)
            .send()
            .await
            .map_err(connection_error)?;
        Self::check(response, id).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(connection_error)?;
        Self::check(response, id).await?;
        Ok(())
    }

    async fn query_all(&self) -> Result<Snapshot, StoreError> {
        let response = self
            .http
            .get(format!("{}/items", self.server_url))
            .send()
            .await
            .map_err(connection_error)?;

        Self::check(response, "")
            .await?
            .json()
            .await
            .map_err(connection_error)
    }

    async fn subscribe(&self) -> Result<SnapshotStream, StoreError> {
        let ws_url = build_ws_url(&self.server_url, "/items/subscribe");

        let (ws_stream, _) = connect_async(&ws_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        tracing::info!("Subscribed to {}", ws_url);

        // `None` state marks a stream that already yielded its terminal error
        let snapshots = stream::unfold(Some(ws_stream), |state| async move {
            let mut ws = state?;
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let snapshot = serde_json::from_str::<Snapshot>(text.as_str())
                            .map_err(|e| StoreError::Backend(format!("Invalid snapshot: {}", e)));
                        let next = snapshot.is_ok().then_some(ws);
                        return Some((snapshot, next));
                    }
                    Some(Ok(Message::Close(_))) | None => return None,
                    // Pings are answered by tungstenite; other frames are ignored
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Some((Err(StoreError::Connection(e.to_string())), None));
                    }
                }
            }
        });

        Ok(snapshots.boxed())
    }
}
