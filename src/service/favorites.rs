use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use super::{channel, TaskSlot};
use crate::db::FavoritesStore;
use crate::error::SwapError;
use crate::models::{ItemResponse, LikedItemEntity};
use crate::repository::ItemRepository;
use crate::resource::Resource;

/// Keeps subscribers supplied with the full listings of the liked items.
///
/// While active, every change of the local id set starts a new hydration
/// through [`ItemRepository::fetch_items_by_ids`]. A hydration still in
/// flight when the set changes is dropped.
pub struct FavoritesService {
    store: Arc<FavoritesStore>,
    items: ItemRepository,
    sender: broadcast::Sender<Resource<Vec<ItemResponse>>>,
    worker: TaskSlot,
}

impl FavoritesService {
    pub fn new(store: Arc<FavoritesStore>, items: ItemRepository) -> Self {
        Self {
            store,
            items,
            sender: channel(),
            worker: TaskSlot::default(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Resource<Vec<ItemResponse>>> {
        self.sender.subscribe()
    }

    /// Starts following the liked id set. Hydrates the current set at once.
    pub fn activate(&self) {
        let handle = tokio::spawn(hydrate(
            self.store.watch(),
            self.items.clone(),
            self.sender.clone(),
        ));
        self.worker.replace(handle);
        tracing::debug!("Favorites service active");
    }

    pub fn deactivate(&self) {
        self.worker.abort();
        tracing::debug!("Favorites service stopped");
    }

    pub fn is_active(&self) -> bool {
        self.worker.is_running()
    }

    pub async fn is_liked(&self, item_id: &str) -> Result<bool, SwapError> {
        Ok(self.store.contains(item_id).await?)
    }

    pub async fn like_item(&self, item_id: &str) -> Result<(), SwapError> {
        self.store.add(item_id).await?;
        Ok(())
    }

    /// Returns false if the item was not liked.
    pub async fn unlike_item(&self, item: &ItemResponse) -> Result<bool, SwapError> {
        let entity = LikedItemEntity::from(item);
        Ok(self.store.remove(&entity.item_id).await?)
    }

    pub fn liked_ids(&self) -> Vec<String> {
        self.store.ids()
    }
}

async fn hydrate(
    mut ids: watch::Receiver<Vec<String>>,
    items: ItemRepository,
    sender: broadcast::Sender<Resource<Vec<ItemResponse>>>,
) {
    'sets: loop {
        let current = ids.borrow_and_update().clone();
        tracing::debug!("Hydrating {} favorites", current.len());
        let mut hydration = items.fetch_items_by_ids(current);

        loop {
            tokio::select! {
                state = hydration.next() => match state {
                    Some(state) => {
                        let _ = sender.send(state);
                    }
                    None => break,
                },
                changed = ids.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    tracing::debug!("Favorites changed mid-hydration, restarting");
                    continue 'sets;
                }
            }
        }

        if ids.changed().await.is_err() {
            return;
        }
    }
}
