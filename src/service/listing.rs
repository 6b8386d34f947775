use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use super::{channel, forward, TaskSlot};
use crate::models::Item;
use crate::remote::IdentityProvider;
use crate::repository::ItemRepository;
use crate::resource::Resource;

/// Holds the listing being composed and submits it.
pub struct ListingService {
    items: ItemRepository,
    identity: Arc<dyn IdentityProvider>,
    draft: Arc<watch::Sender<Item>>,
    sender: broadcast::Sender<Resource<String>>,
    submission: TaskSlot,
}

impl ListingService {
    pub fn new(items: ItemRepository, identity: Arc<dyn IdentityProvider>) -> Self {
        let (draft, _) = watch::channel(Item::default());
        Self {
            items,
            identity,
            draft: Arc::new(draft),
            sender: channel(),
            submission: TaskSlot::default(),
        }
    }

    /// Submission states. Each `submit()` publishes `Loading` and then one
    /// terminal state carrying the new document id.
    pub fn subscribe(&self) -> broadcast::Receiver<Resource<String>> {
        self.sender.subscribe()
    }

    pub fn update_draft(&self, item: Item) {
        self.draft.send_replace(item);
    }

    pub fn clear_draft(&self) {
        self.draft.send_replace(Item::default());
    }

    pub fn draft(&self) -> Item {
        self.draft.borrow().clone()
    }

    pub fn watch_draft(&self) -> watch::Receiver<Item> {
        self.draft.subscribe()
    }

    /// Uploads the current draft as-is; see [`Item::validate`] for the
    /// checks a front end should run first. A submission still in flight
    /// is cancelled. Once the upload succeeds the draft is cleared, unless
    /// it was edited in the meantime.
    pub fn submit(&self) {
        let submitted = self.draft();
        let mut item = submitted.clone();
        item.listed_date = Utc::now();
        item.listed_by_key = self.identity.current_user_id().unwrap_or_default();
        tracing::debug!("Submitting '{}' for {}", item.name, item.listed_by_key);

        let stream = self.items.upload_item(item);
        let sender = self.sender.clone();
        let draft = Arc::clone(&self.draft);
        let handle = tokio::spawn(async move {
            if let Some(Resource::Success(_)) = forward(stream, &sender).await {
                draft.send_if_modified(|current| {
                    if *current != submitted {
                        return false;
                    }
                    *current = Item::default();
                    true
                });
            }
        });
        self.submission.replace(handle);
    }

    pub fn is_submitting(&self) -> bool {
        self.submission.is_running()
    }
}
