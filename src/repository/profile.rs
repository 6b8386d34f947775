use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::documents::user_state_from_document;
use crate::error::SwapError;
use crate::models::{UserData, UserDataState};
use crate::remote::{DocumentStore, Fields, IdentityProvider, ObjectStorage, USERS_COLLECTION};
use crate::resource::{resource_stream, ResourceStream};

pub const PROFILE_UPDATED: &str = "Updated Successfully..";

/// The signed-in user's `users` document.
#[derive(Clone)]
pub struct ProfileRepository {
    documents: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    identity: Arc<dyn IdentityProvider>,
}

impl ProfileRepository {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            documents,
            storage,
            identity,
        }
    }

    pub fn fetch_profile(&self) -> ResourceStream<UserDataState> {
        let repo = self.clone();
        resource_stream(async move {
            let user_id = repo.user_id()?;
            tracing::debug!("Fetching profile {}", user_id);
            let doc = repo
                .documents
                .get(USERS_COLLECTION, &user_id)
                .await
                .map_err(|e| SwapError::remote("Failed to fetch profile", e))?
                .ok_or_else(|| SwapError::NotFound("User not found".to_string()))?;
            Ok(user_state_from_document(&doc))
        })
    }

    /// Writes name and address, plus a freshly uploaded image when the
    /// draft carries one.
    pub fn update_profile(&self, draft: UserData) -> ResourceStream<String> {
        let repo = self.clone();
        resource_stream(async move { repo.update(draft).await })
    }

    async fn update(&self, draft: UserData) -> Result<String, SwapError> {
        let user_id = self.user_id()?;

        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!(draft.name));
        fields.insert("address".to_string(), json!(draft.address));

        if let Some(bytes) = draft.image {
            let key = format!("user/{}", Uuid::new_v4());
            self.storage
                .put(&key, bytes)
                .await
                .map_err(|e| SwapError::remote("Failed to upload image", e))?;
            let url = self
                .storage
                .download_url(&key)
                .await
                .map_err(|e| SwapError::remote("Failed to upload image", e))?;
            fields.insert("image".to_string(), json!(url));
        }

        self.documents
            .update(USERS_COLLECTION, &user_id, fields)
            .await
            .map_err(|e| SwapError::remote("Failed to update profile", e))?;
        tracing::info!("Updated profile {}", user_id);
        Ok(PROFILE_UPDATED.to_string())
    }

    fn user_id(&self) -> Result<String, SwapError> {
        self.identity
            .current_user_id()
            .ok_or(SwapError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryDocumentStore, MemoryIdentity, MemoryObjectStorage, StoreOp};
    use crate::resource::{settle, Resource};
    use futures::StreamExt;

    struct TestContext {
        repo: ProfileRepository,
        documents: Arc<MemoryDocumentStore>,
        storage: Arc<MemoryObjectStorage>,
    }

    fn setup(identity: MemoryIdentity) -> TestContext {
        let documents = Arc::new(MemoryDocumentStore::new());
        let storage = Arc::new(MemoryObjectStorage::default());
        TestContext {
            repo: ProfileRepository::new(documents.clone(), storage.clone(), Arc::new(identity)),
            documents,
            storage,
        }
    }

    fn profile(name: &str, image: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(name));
        fields.insert("email".into(), json!("sam@example.com"));
        fields.insert("address".into(), json!("York"));
        fields.insert("image".into(), json!(image));
        fields
    }

    #[tokio::test]
    async fn test_fetch_profile() {
        let ctx = setup(MemoryIdentity::signed_in("u1"));
        ctx.documents
            .insert(USERS_COLLECTION, "u1", profile("Sam", "https://img/1"));

        let states: Vec<Resource<UserDataState>> = ctx.repo.fetch_profile().collect().await;
        assert!(states[0].is_loading());
        let state = states[1].success().unwrap();
        assert_eq!(state.user_id, "u1");
        assert_eq!(state.name, "Sam");
        assert_eq!(state.address, "York");
        assert_eq!(state.image.as_deref(), Some("https://img/1"));
    }

    #[tokio::test]
    async fn test_fetch_profile_requires_session() {
        let ctx = setup(MemoryIdentity::new());

        let err = settle(ctx.repo.fetch_profile()).await.unwrap_err();
        assert_eq!(err, SwapError::Unauthenticated);
        assert_eq!(ctx.documents.call_count(StoreOp::Get), 0);
    }

    #[tokio::test]
    async fn test_fetch_profile_missing_document() {
        let ctx = setup(MemoryIdentity::signed_in("u1"));

        let err = settle(ctx.repo.fetch_profile()).await.unwrap_err();
        assert_eq!(err.to_string(), "User not found");
    }

    #[tokio::test]
    async fn test_update_without_image_keeps_text_fields() {
        let ctx = setup(MemoryIdentity::signed_in("u1"));
        ctx.documents
            .insert(USERS_COLLECTION, "u1", profile("Sam", "https://img/1"));

        let message = settle(ctx.repo.update_profile(UserData::new("Samira", "Hull")))
            .await
            .unwrap();
        assert_eq!(message, "Updated Successfully..");

        let stored = ctx.documents.snapshot(USERS_COLLECTION, "u1").unwrap();
        assert_eq!(stored.get("name"), Some(&json!("Samira")));
        assert_eq!(stored.get("address"), Some(&json!("Hull")));
        assert_eq!(stored.get("image"), Some(&json!("https://img/1")));
        assert_eq!(ctx.storage.put_count(), 0);
    }

    #[tokio::test]
    async fn test_update_with_image_uploads_under_user_prefix() {
        let ctx = setup(MemoryIdentity::signed_in("u1"));
        ctx.documents
            .insert(USERS_COLLECTION, "u1", profile("Sam", ""));

        let draft = UserData::new("Sam", "York").with_image(vec![9, 9, 9]);
        settle(ctx.repo.update_profile(draft)).await.unwrap();

        let keys = ctx.storage.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("user/"));
        let stored = ctx.documents.snapshot(USERS_COLLECTION, "u1").unwrap();
        let url = stored.get("image").and_then(|v| v.as_str()).unwrap();
        assert!(url.starts_with("memory://"));
    }

    #[tokio::test]
    async fn test_update_image_failure_writes_nothing() {
        let ctx = setup(MemoryIdentity::signed_in("u1"));
        ctx.documents
            .insert(USERS_COLLECTION, "u1", profile("Sam", ""));
        ctx.storage.fail_put_at(0);

        let draft = UserData::new("Other", "York").with_image(vec![1]);
        let err = settle(ctx.repo.update_profile(draft)).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to upload image"));
        assert_eq!(ctx.documents.call_count(StoreOp::Update), 0);
    }

    #[tokio::test]
    async fn test_update_requires_session() {
        let ctx = setup(MemoryIdentity::new());

        let err = settle(ctx.repo.update_profile(UserData::new("A", "B")))
            .await
            .unwrap_err();
        assert!(err.is_unauthenticated());
    }
}
