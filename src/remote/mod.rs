//! Interfaces to the hosted services the client talks to.
//!
//! The document store, object storage and identity service are opaque to
//! this crate. Each is a trait here, with two implementations:
//! - [`memory`]: process-local, with failure injection for tests
//! - [`emulator`]: SQLite plus a blob directory, so state survives
//!   between CLI runs
//!
//! # Collections
//!
//! ```text
//! sportItems/{id}  name, description, listedDate, images[], type,
//!                  condition, listedByKey, price, status, address,
//!                  location { latitude, longitude }
//! users/{uid}      name, email, phone, address, image, listedItems[]
//! ```

pub mod credentials;
pub mod emulator;
pub mod memory;

pub use emulator::EmulatorBackend;
pub use memory::{MemoryDocumentStore, MemoryIdentity, MemoryObjectStorage, StoreOp};

use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const ITEMS_COLLECTION: &str = "sportItems";
pub const USERS_COLLECTION: &str = "users";

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// A document read from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Failures reported by a remote service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("no document {collection}/{id}")]
    DocumentNotFound { collection: String, id: String },

    #[error("no object at {0}")]
    ObjectNotFound(String),

    #[error("the email address is already in use: {0}")]
    EmailInUse(String),

    #[error("the email address or password is incorrect")]
    InvalidCredentials,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("backend storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RemoteError {
    fn from(e: sqlx::Error) -> Self {
        RemoteError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        RemoteError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Storage(e.to_string())
    }
}

/// Read-modify-write step for [`DocumentStore::transact`].
///
/// Receives the current fields (`None` if the document does not exist) and
/// returns the fields to write, or `None` to leave the document untouched.
pub type Mutation<'a> =
    &'a (dyn Fn(Option<Fields>) -> Result<Option<Fields>, RemoteError> + Send + Sync);

/// A collection-oriented document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError>;

    async fn list(&self, collection: &str) -> Result<Vec<Document>, RemoteError>;

    /// Documents whose `field` equals `value`.
    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, RemoteError>;

    /// Creates a document under a generated id and returns the id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, RemoteError>;

    /// Creates or overwrites a document.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RemoteError>;

    /// Merges `fields` into an existing document. Fails if it does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Fields)
        -> Result<(), RemoteError>;

    /// Runs `mutate` atomically against one document.
    async fn transact(
        &self,
        collection: &str,
        id: &str,
        mutate: Mutation<'_>,
    ) -> Result<(), RemoteError>;
}

/// Write-once blob storage addressed by key.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), RemoteError>;

    /// Resolves a URL the blob can be downloaded from.
    async fn download_url(&self, key: &str) -> Result<String, RemoteError>;
}

/// Remote identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, RemoteError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Session, RemoteError>;

    /// Exchanges a Google ID token for a session.
    async fn sign_in_with_google(&self, id_token: &str) -> Result<Session, RemoteError>;

    async fn sign_out(&self) -> Result<(), RemoteError>;

    fn current_session(&self) -> Option<Session>;

    fn current_user_id(&self) -> Option<String> {
        self.current_session().map(|s| s.user_id)
    }
}

/// Generates a 20-character document id.
pub fn generate_document_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}
