//! SQLite-backed `items` collection.
//!
//! Every successful write re-reads the whole table and broadcasts it to
//! subscribers. Writes are serialized through `write_lock` so subscribers see
//! snapshots in write order.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use pantry_core::store::{snapshot_stream, SnapshotStream, SUBSCRIBER_BUFFER};
use pantry_core::{DocumentStore, Item, ItemUpdate, NewItem, Snapshot, StoreError};
use sqlx::SqlitePool;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: String,
    name: String,
    quantity: f64,
    unit: String,
    image_url: String,
    image_path: String,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            name: row.name,
            quantity: row.quantity,
            unit: row.unit,
            image_url: row.image_url,
            image_path: row.image_path,
        }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

pub struct SqliteDocumentStore {
    pool: SqlitePool,
    hub: broadcast::Sender<Snapshot>,
    write_lock: Mutex<()>,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        let (hub, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            pool,
            hub,
            write_lock: Mutex::new(()),
        }
    }

    async fn load_all(&self) -> Result<Snapshot, StoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            "SELECT id, name, quantity, unit, image_url, image_path FROM items ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Broadcasts the current table. Called with `write_lock` held, after the
    /// write has committed.
    ///
    /// A failed re-read does not fail the write; subscribers catch up on the
    /// next successful publish.
    async fn publish(&self) {
        let snapshot = match self.load_all().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Write committed but snapshot publish failed: {}", e);
                return;
            }
        };
        tracing::debug!(
            "Publishing snapshot of {} item(s) to {} subscriber(s)",
            snapshot.len(),
            self.hub.receiver_count()
        );
        // Ignore send errors (no subscribers)
        let _ = self.hub.send(snapshot);
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create(&self, item: NewItem) -> Result<String, StoreError> {
        let _guard = self.write_lock.lock().await;

        let id = Uuid::new_v4().simple().to_string();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            r#"
            INSERT INTO items (id, name, quantity, unit, image_url, image_path, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(&item.image_url)
        .bind(&item.image_path)
        .bind(&created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        tracing::info!("Created item {} ({})", id, item.name);
        self.publish().await;
        Ok(id)
    }

    async fn update(&self, id: &str, update: &ItemUpdate) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query(
            r#"
            UPDATE items
            SET name = COALESCE(?, name),
                quantity = COALESCE(?, quantity),
                unit = COALESCE(?, unit)
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(update.quantity)
        .bind(&update.unit)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.publish().await;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() > 0 {
            tracing::info!("Deleted item {}", id);
            self.publish().await;
        }
        Ok(())
    }

    async fn query_all(&self) -> Result<Snapshot, StoreError> {
        self.load_all().await
    }

    async fn subscribe(&self) -> Result<SnapshotStream, StoreError> {
        // Hold the write lock so no write lands between the read and the subscribe
        let _guard = self.write_lock.lock().await;
        let initial = self.load_all().await?;
        let receiver = self.hub.subscribe();
        Ok(snapshot_stream(initial, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use futures::StreamExt;
    use tempfile::TempDir;

    async fn setup() -> (SqliteDocumentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        (SqliteDocumentStore::new(pool), temp_dir)
    }

    fn new_item(name: &str, quantity: f64) -> NewItem {
        NewItem {
            name: name.to_string(),
            quantity,
            unit: "bags".to_string(),
            image_url: format!("http://localhost:8080/o/images%2Fx_{}.png?alt=media", name),
            image_path: format!("images/x_{}.png", name),
        }
    }

    #[tokio::test]
    async fn test_create_and_query() {
        let (store, _temp) = setup().await;

        let id = store.create(new_item("Rice", 2.0)).await.unwrap();
        let items = store.query_all().await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].name, "Rice");
        assert_eq!(items[0].quantity, 2.0);
        assert_eq!(items[0].image_path, "images/x_Rice.png");
    }

    #[tokio::test]
    async fn test_update_only_given_fields() {
        let (store, _temp) = setup().await;
        let id = store.create(new_item("Rice", 2.0)).await.unwrap();

        let update = ItemUpdate {
            quantity: Some(5.0),
            ..Default::default()
        };
        store.update(&id, &update).await.unwrap();

        let items = store.query_all().await.unwrap();
        assert_eq!(items[0].quantity, 5.0);
        assert_eq!(items[0].name, "Rice");
        assert_eq!(items[0].unit, "bags");
        assert!(!items[0].image_url.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_returns_not_found() {
        let (store, _temp) = setup().await;
        let update = ItemUpdate {
            name: Some("Beans".to_string()),
            ..Default::default()
        };
        let result = store.update("missing", &update).await;
        assert_eq!(result, Err(StoreError::NotFound("missing".to_string())));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _temp) = setup().await;
        let id = store.create(new_item("Rice", 2.0)).await.unwrap();

        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(store.query_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_pushes_snapshots() {
        let (store, _temp) = setup().await;
        store.create(new_item("Rice", 2.0)).await.unwrap();

        let mut snapshots = store.subscribe().await.unwrap();
        assert_eq!(snapshots.next().await.unwrap().unwrap().len(), 1);

        let id = store.create(new_item("Beans", 1.0)).await.unwrap();
        assert_eq!(snapshots.next().await.unwrap().unwrap().len(), 2);

        let update = ItemUpdate {
            unit: Some("cans".to_string()),
            ..Default::default()
        };
        store.update(&id, &update).await.unwrap();
        let snapshot = snapshots.next().await.unwrap().unwrap();
        let beans = snapshot.iter().find(|i| i.id == id).unwrap();
        assert_eq!(beans.unit, "cans");

        store.delete(&id).await.unwrap();
        let snapshot = snapshots.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].name, "Rice");
    }

    #[tokio::test]
    async fn test_committed_write_succeeds_when_publish_fails() {
        let (store, _temp) = setup().await;
        let rice = store.create(new_item("Rice", 2.0)).await.unwrap();
        let beans = store.create(new_item("Beans", 1.0)).await.unwrap();

        // UPDATE and DELETE still work, but re-reading the table no longer does
        sqlx::query("ALTER TABLE items RENAME COLUMN image_url TO image_link")
            .execute(&store.pool)
            .await
            .unwrap();
        assert!(store.query_all().await.is_err());

        let update = ItemUpdate {
            quantity: Some(7.0),
            ..Default::default()
        };
        assert_eq!(store.update(&rice, &update).await, Ok(()));
        assert_eq!(store.delete(&beans).await, Ok(()));

        let rows: Vec<(String, f64)> = sqlx::query_as("SELECT id, quantity FROM items")
            .fetch_all(&store.pool)
            .await
            .unwrap();
        assert_eq!(rows, vec![(rice, 7.0)]);
    }
}
