use serde_json::json;
use std::sync::Arc;

use crate::error::SwapError;
use crate::remote::{
    DocumentStore, Fields, IdentityProvider, RemoteError, Session, USERS_COLLECTION,
};
use crate::resource::{resource_stream, ResourceStream};

/// Sign-in, sign-up and session lookup against the identity service.
#[derive(Clone)]
pub struct AuthGateway {
    identity: Arc<dyn IdentityProvider>,
    documents: Arc<dyn DocumentStore>,
}

impl AuthGateway {
    pub fn new(identity: Arc<dyn IdentityProvider>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            identity,
            documents,
        }
    }

    pub fn login(&self, email: &str, password: &str) -> ResourceStream<Session> {
        let gateway = self.clone();
        let (email, password) = (email.to_string(), password.to_string());
        resource_stream(async move {
            let session = gateway
                .identity
                .sign_in(&email, &password)
                .await
                .map_err(|e| auth_error("Failed to sign in", e))?;
            tracing::info!("Signed in as {}", session.user_id);
            Ok(session)
        })
    }

    /// Creates the account, then its `users` profile document.
    pub fn register(&self, email: &str, password: &str, name: &str) -> ResourceStream<Session> {
        let gateway = self.clone();
        let (email, password, name) = (email.to_string(), password.to_string(), name.to_string());
        resource_stream(async move {
            let session = gateway
                .identity
                .sign_up(&email, &password, Some(&name))
                .await
                .map_err(|e| auth_error("Failed to register", e))?;
            gateway
                .save_user(&session.user_id, &email, &name)
                .await
                .map_err(|e| SwapError::remote("Failed to save user", e))?;
            tracing::info!("Registered {}", session.user_id);
            Ok(session)
        })
    }

    /// Signs in with a Google ID token. First-time users get a profile
    /// document built from the token's email and name.
    pub fn sign_in_with_google(&self, id_token: &str) -> ResourceStream<Session> {
        let gateway = self.clone();
        let id_token = id_token.to_string();
        resource_stream(async move {
            let session = gateway
                .identity
                .sign_in_with_google(&id_token)
                .await
                .map_err(|e| auth_error("Failed to sign in", e))?;

            let existing = gateway
                .documents
                .get(USERS_COLLECTION, &session.user_id)
                .await
                .map_err(|e| SwapError::remote("Failed to load user", e))?;
            if existing.is_none() {
                gateway
                    .save_user(
                        &session.user_id,
                        session.email.as_deref().unwrap_or_default(),
                        session.display_name.as_deref().unwrap_or_default(),
                    )
                    .await
                    .map_err(|e| SwapError::remote("Failed to save user", e))?;
            }
            Ok(session)
        })
    }

    pub async fn sign_out(&self) -> Result<(), SwapError> {
        self.identity
            .sign_out()
            .await
            .map_err(|e| auth_error("Failed to sign out", e))?;
        tracing::info!("Signed out");
        Ok(())
    }

    pub fn current_session(&self) -> Option<Session> {
        self.identity.current_session()
    }

    async fn save_user(&self, user_id: &str, email: &str, name: &str) -> Result<(), RemoteError> {
        let mut fields = Fields::new();
        fields.insert("email".to_string(), json!(email));
        fields.insert("name".to_string(), json!(name));
        self.documents.set(USERS_COLLECTION, user_id, fields).await
    }
}

/// Rejections by the identity service are `Auth`; outages stay `Remote`.
fn auth_error(context: &'static str, e: RemoteError) -> SwapError {
    match e {
        RemoteError::Unavailable(_) | RemoteError::Storage(_) => SwapError::remote(context, e),
        e => SwapError::Auth(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::credentials::encode_test_id_token;
    use crate::remote::{MemoryDocumentStore, MemoryIdentity, StoreOp};
    use crate::resource::{settle, Resource};
    use futures::StreamExt;

    struct TestContext {
        gateway: AuthGateway,
        identity: Arc<MemoryIdentity>,
        documents: Arc<MemoryDocumentStore>,
    }

    fn setup() -> TestContext {
        let identity = Arc::new(MemoryIdentity::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        TestContext {
            gateway: AuthGateway::new(identity.clone(), documents.clone()),
            identity,
            documents,
        }
    }

    #[tokio::test]
    async fn test_register_creates_profile_document() {
        let ctx = setup();

        let states: Vec<Resource<Session>> = ctx
            .gateway
            .register("sam@example.com", "secret", "Sam")
            .collect()
            .await;

        assert!(states[0].is_loading());
        let session = states[1].success().unwrap();
        let profile = ctx.documents.snapshot(USERS_COLLECTION, &session.user_id).unwrap();
        assert_eq!(profile.get("name"), Some(&json!("Sam")));
        assert_eq!(profile.get("email"), Some(&json!("sam@example.com")));
        assert_eq!(ctx.gateway.current_session().as_ref(), Some(session));
    }

    #[tokio::test]
    async fn test_login_with_bad_password_is_auth_error() {
        let ctx = setup();
        settle(ctx.gateway.register("sam@example.com", "secret", "Sam"))
            .await
            .unwrap();
        ctx.gateway.sign_out().await.unwrap();

        let err = settle(ctx.gateway.login("sam@example.com", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Auth(_)));
        assert!(ctx.gateway.current_session().is_none());
    }

    #[tokio::test]
    async fn test_login_after_register() {
        let ctx = setup();
        let created = settle(ctx.gateway.register("sam@example.com", "secret", "Sam"))
            .await
            .unwrap();
        ctx.gateway.sign_out().await.unwrap();

        let session = settle(ctx.gateway.login("sam@example.com", "secret"))
            .await
            .unwrap();
        assert_eq!(session.user_id, created.user_id);
    }

    #[tokio::test]
    async fn test_register_reports_profile_write_failure() {
        let ctx = setup();
        ctx.documents.fail_next(StoreOp::Set, "offline");

        let err = settle(ctx.gateway.register("sam@example.com", "secret", "Sam"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to save user"));
    }

    #[tokio::test]
    async fn test_google_sign_in_creates_profile_once() {
        let ctx = setup();
        let token = encode_test_id_token("g-7", "gee@example.com", "Gee");

        let session = settle(ctx.gateway.sign_in_with_google(&token))
            .await
            .unwrap();
        let mut fields = ctx
            .documents
            .snapshot(USERS_COLLECTION, &session.user_id)
            .unwrap();
        fields.insert("address".into(), json!("Leeds"));
        ctx.documents
            .insert(USERS_COLLECTION, &session.user_id, fields);

        settle(ctx.gateway.sign_in_with_google(&token))
            .await
            .unwrap();
        let profile = ctx.documents.snapshot(USERS_COLLECTION, &session.user_id).unwrap();
        assert_eq!(profile.get("name"), Some(&json!("Gee")));
        assert_eq!(profile.get("address"), Some(&json!("Leeds")));
    }

    #[tokio::test]
    async fn test_identity_outage_is_reported() {
        let ctx = setup();
        ctx.identity.fail_next("timeout");

        let err = settle(ctx.gateway.login("a@b.com", "pw")).await.unwrap_err();
        assert!(matches!(err, SwapError::Remote { .. }));
        assert_eq!(err.to_string(), "Failed to sign in: service unavailable: timeout");
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_auth_error() {
        let ctx = setup();
        settle(ctx.gateway.register("sam@example.com", "secret", "Sam"))
            .await
            .unwrap();

        let err = settle(ctx.gateway.register("sam@example.com", "other", "Sam"))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::Auth(_)));
    }
}
