use futures::future::{join_all, try_join_all};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::documents::{
    append_unique, item_fields, item_from_document, item_from_document_lenient, owner_key,
    user_model_from_document,
};
use crate::error::SwapError;
use crate::models::{Item, ItemResponse, UserModel};
use crate::remote::{
    Document, DocumentStore, Fields, IdentityProvider, ObjectStorage, RemoteError,
    ITEMS_COLLECTION, USERS_COLLECTION,
};
use crate::resource::{resource_stream, ResourceStream};

const UPLOAD_FAILED: &str = "Failed to upload item";
const RETRIEVE_FAILED: &str = "Error retrieving items";
const DETAILS_FAILED: &str = "Failed to fetch item details";
const BATCH_FAILED: &str = "Error fetching Items";

/// Reads and writes listings in the remote document store.
///
/// Every operation returns a [`ResourceStream`]; remote failures become
/// `Resource::Error` and are never retried here.
///
/// Writes that run after a result is emitted are tracked; call
/// [`ItemRepository::flush`] before shutting the runtime down.
#[derive(Clone)]
pub struct ItemRepository {
    documents: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    identity: Arc<dyn IdentityProvider>,
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ItemRepository {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            documents,
            storage,
            identity,
            background: Arc::default(),
        }
    }

    /// Waits for background writes started by earlier uploads.
    pub async fn flush(&self) {
        let pending = std::mem::take(
            &mut *self
                .background
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for result in join_all(pending).await {
            if let Err(e) = result {
                tracing::warn!("Background write did not complete: {}", e);
            }
        }
    }

    /// Uploads the item's images, creates the listing document and yields
    /// its id.
    ///
    /// The id is then appended to the current user's `listedItems` in the
    /// background; that step cannot change the result. A user without a
    /// `users` document is left without one.
    pub fn upload_item(&self, item: Item) -> ResourceStream<String> {
        let repo = self.clone();
        resource_stream(async move { repo.upload(item).await })
    }

    pub fn fetch_all_items(&self) -> ResourceStream<Vec<ItemResponse>> {
        let repo = self.clone();
        resource_stream(async move {
            let docs = repo
                .documents
                .list(ITEMS_COLLECTION)
                .await
                .map_err(|e| SwapError::remote(RETRIEVE_FAILED, e))?;
            Ok(map_listings(docs))
        })
    }

    /// Yields `NotFound("Item not found")` if the document does not exist.
    pub fn fetch_item_by_id(&self, id: &str) -> ResourceStream<ItemResponse> {
        let repo = self.clone();
        let id = id.to_string();
        resource_stream(async move { repo.item_details(&id).await })
    }

    /// Listings owned by the signed-in user.
    pub fn fetch_my_listed_items(&self) -> ResourceStream<Vec<ItemResponse>> {
        let repo = self.clone();
        resource_stream(async move {
            let user_id = repo
                .identity
                .current_user_id()
                .ok_or(SwapError::Unauthenticated)?;
            let docs = repo
                .documents
                .query_eq(ITEMS_COLLECTION, "listedByKey", &json!(user_id))
                .await
                .map_err(|e| SwapError::remote(RETRIEVE_FAILED, e))?;
            Ok(map_listings(docs))
        })
    }

    /// Resolves ids to listings, in input order. Ids with no (or no
    /// well-formed) document are left out.
    pub fn fetch_items_by_ids(&self, ids: Vec<String>) -> ResourceStream<Vec<ItemResponse>> {
        let repo = self.clone();
        resource_stream(async move {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let fetches = ids
                .iter()
                .map(|id| repo.documents.get(ITEMS_COLLECTION, id));
            let docs = try_join_all(fetches)
                .await
                .map_err(|e| SwapError::remote(BATCH_FAILED, e))?;
            Ok(map_listings(docs.into_iter().flatten().collect()))
        })
    }

    async fn upload(&self, item: Item) -> Result<String, SwapError> {
        let keys: Vec<String> = item
            .images
            .iter()
            .map(|_| format!("images/{}", Uuid::new_v4()))
            .collect();
        tracing::debug!("Uploading {} image(s) for '{}'", keys.len(), item.name);

        let uploads = keys
            .iter()
            .zip(&item.images)
            .map(|(key, bytes)| self.storage.put(key, bytes.clone()));
        let results = join_all(uploads).await;

        if let Some(err) = results.iter().find_map(|r| r.as_ref().err()) {
            let orphaned: Vec<&str> = keys
                .iter()
                .zip(&results)
                .filter(|(_, r)| r.is_ok())
                .map(|(key, _)| key.as_str())
                .collect();
            if !orphaned.is_empty() {
                tracing::warn!(orphaned = ?orphaned, "Image upload failed; blobs left behind");
            }
            return Err(SwapError::remote(UPLOAD_FAILED, err.clone()));
        }

        let urls = try_join_all(keys.iter().map(|key| self.storage.download_url(key)))
            .await
            .map_err(|e| SwapError::remote(UPLOAD_FAILED, e))?;

        let id = self
            .documents
            .add(ITEMS_COLLECTION, item_fields(&item, urls))
            .await
            .map_err(|e| SwapError::remote(UPLOAD_FAILED, e))?;
        tracing::info!("Item uploaded with ID: {}", id);

        self.spawn_listed_item_append(id.clone());
        Ok(id)
    }

    /// Records `item_id` on the signed-in user's document without holding
    /// up the caller.
    fn spawn_listed_item_append(&self, item_id: String) {
        let Some(user_id) = self.identity.current_user_id() else {
            tracing::warn!("No session; item {} not added to any user's listings", item_id);
            return;
        };
        let documents = Arc::clone(&self.documents);

        let handle = tokio::spawn(async move {
            let mutate = |current: Option<Fields>| -> Result<Option<Fields>, RemoteError> {
                let Some(mut fields) = current else {
                    return Err(RemoteError::DocumentNotFound {
                        collection: USERS_COLLECTION.to_string(),
                        id: user_id.clone(),
                    });
                };
                if append_unique(&mut fields, "listedItems", &item_id) {
                    Ok(Some(fields))
                } else {
                    Ok(None)
                }
            };
            match documents.transact(USERS_COLLECTION, &user_id, &mutate).await {
                Ok(()) => tracing::debug!("Added {} to listings of {}", item_id, user_id),
                Err(e) => tracing::warn!(
                    "Failed to add {} to listings of {}: {}",
                    item_id,
                    user_id,
                    e
                ),
            }
        });

        let mut background = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        background.retain(|task| !task.is_finished());
        background.push(handle);
    }

    async fn item_details(&self, id: &str) -> Result<ItemResponse, SwapError> {
        let doc = self
            .documents
            .get(ITEMS_COLLECTION, id)
            .await
            .map_err(|e| SwapError::remote(DETAILS_FAILED, e))?
            .ok_or_else(|| SwapError::NotFound("Item not found".to_string()))?;

        let listed_by = match owner_key(&doc) {
            Some(owner) => self.owner(owner).await,
            None => None,
        };
        Ok(item_from_document_lenient(&doc, listed_by))
    }

    /// Owner lookup never fails the caller; problems just leave it empty.
    async fn owner(&self, user_id: &str) -> Option<UserModel> {
        match self.documents.get(USERS_COLLECTION, user_id).await {
            Ok(doc) => doc.as_ref().map(user_model_from_document),
            Err(e) => {
                tracing::warn!("Owner lookup for {} failed: {}", user_id, e);
                None
            }
        }
    }
}

/// Strict mapping over a list read; malformed documents are skipped.
fn map_listings(docs: Vec<Document>) -> Vec<ItemResponse> {
    docs.iter()
        .filter_map(|doc| match item_from_document(doc) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping malformed item {}: {}", doc.id, e);
                None
            }
        })
        .collect()
}
