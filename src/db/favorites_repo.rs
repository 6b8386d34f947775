use sqlx::SqlitePool;
use tokio::sync::{watch, Mutex};

use super::StoreError;
use crate::models::LikedItemEntity;

/// On-device set of liked item ids.
///
/// Every write republishes the id set on a watch channel so callers can
/// follow it as a live sequence. Writes are serialized so a slower writer
/// can never publish a set older than one already published.
pub struct FavoritesStore {
    pool: SqlitePool,
    ids: watch::Sender<Vec<String>>,
    write_lock: Mutex<()>,
}

impl FavoritesStore {
    pub async fn open(pool: SqlitePool) -> Result<Self, StoreError> {
        let initial = load_ids(&pool).await?;
        let (ids, _) = watch::channel(initial);
        Ok(Self {
            pool,
            ids,
            write_lock: Mutex::new(()),
        })
    }

    /// Marks an item as liked. Liking twice is a no-op.
    pub async fn add(&self, item_id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("INSERT OR REPLACE INTO liked_items (item_id) VALUES (?)")
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        tracing::debug!("Liked item {}", item_id);
        self.publish().await
    }

    /// Removes a like. Returns false if the item was not liked.
    pub async fn remove(&self, item_id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM liked_items WHERE item_id = ?")
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected() > 0;
        if removed {
            tracing::debug!("Unliked item {}", item_id);
            self.publish().await?;
        }
        Ok(removed)
    }

    pub async fn all(&self) -> Result<Vec<LikedItemEntity>, StoreError> {
        let rows: Vec<LikedItemEntity> =
            sqlx::query_as("SELECT item_id FROM liked_items ORDER BY item_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn contains(&self, item_id: &str) -> Result<bool, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT item_id FROM liked_items WHERE item_id = ?")
                .bind(item_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Live view of the liked id set. Only actual changes wake receivers.
    pub fn watch(&self) -> watch::Receiver<Vec<String>> {
        self.ids.subscribe()
    }

    /// Snapshot of the id set as last published.
    pub fn ids(&self) -> Vec<String> {
        self.ids.borrow().clone()
    }

    async fn publish(&self) -> Result<(), StoreError> {
        let latest = load_ids(&self.pool).await?;
        self.ids.send_if_modified(|current| {
            if *current == latest {
                false
            } else {
                *current = latest;
                true
            }
        });
        Ok(())
    }
}

async fn load_ids(pool: &SqlitePool) -> Result<Vec<String>, StoreError> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT item_id FROM liked_items ORDER BY item_id")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}
