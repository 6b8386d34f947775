//! In-process service backends.
//!
//! Each type can be told to fail its next call (or a specific call) so the
//! error paths of the repositories can be exercised.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::credentials::{generate_salt, hash_password, normalize_email, GoogleIdToken};
use super::{
    generate_document_id, Document, DocumentStore, Fields, IdentityProvider, Mutation,
    ObjectStorage, RemoteError, Session,
};

/// Operations of [`MemoryDocumentStore`] that can be failed or counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    List,
    Query,
    Add,
    Set,
    Update,
    Transact,
}

#[derive(Debug, Default)]
struct DocumentsInner {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    failures: HashMap<StoreOp, String>,
    calls: HashMap<StoreOp, usize>,
}

/// Document store held in memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<DocumentsInner>,
    latency: Mutex<Option<Duration>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of `op` fail with `RemoteError::Unavailable`.
    pub fn fail_next(&self, op: StoreOp, message: &str) {
        self.lock().failures.insert(op, message.to_string());
    }

    /// Delays every `get` by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = Some(latency);
    }

    pub fn call_count(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Direct write, bypassing failure injection and counters.
    pub fn insert(&self, collection: &str, id: &str, fields: Fields) {
        self.lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    /// Direct delete, bypassing failure injection and counters.
    pub fn remove(&self, collection: &str, id: &str) {
        if let Some(docs) = self.lock().collections.get_mut(collection) {
            docs.remove(id);
        }
    }

    /// Direct read, bypassing failure injection and counters.
    pub fn snapshot(&self, collection: &str, id: &str) -> Option<Fields> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn lock(&self) -> MutexGuard<'_, DocumentsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call and applies any pending failure.
    fn enter(&self, op: StoreOp) -> Result<MutexGuard<'_, DocumentsInner>, RemoteError> {
        let mut inner = self.lock();
        *inner.calls.entry(op).or_insert(0) += 1;
        match inner.failures.remove(&op) {
            Some(message) => Err(RemoteError::Unavailable(message)),
            None => Ok(inner),
        }
    }

    fn docs(inner: &DocumentsInner, collection: &str) -> Vec<Document> {
        inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError> {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let inner = self.enter(StoreOp::Get)?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, RemoteError> {
        let inner = self.enter(StoreOp::List)?;
        Ok(Self::docs(&inner, collection))
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, RemoteError> {
        let inner = self.enter(StoreOp::Query)?;
        Ok(Self::docs(&inner, collection)
            .into_iter()
            .filter(|doc| doc.fields.get(field) == Some(value))
            .collect())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, RemoteError> {
        let mut inner = self.enter(StoreOp::Add)?;
        let id = generate_document_id();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RemoteError> {
        let mut inner = self.enter(StoreOp::Set)?;
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), RemoteError> {
        let mut inner = self.enter(StoreOp::Update)?;
        let existing = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| RemoteError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        existing.extend(fields);
        Ok(())
    }

    async fn transact(
        &self,
        collection: &str,
        id: &str,
        mutate: Mutation<'_>,
    ) -> Result<(), RemoteError> {
        let mut inner = self.enter(StoreOp::Transact)?;
        let docs = inner.collections.entry(collection.to_string()).or_default();
        if let Some(fields) = mutate(docs.get(id).cloned())? {
            docs.insert(id.to_string(), fields);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ObjectsInner {
    objects: BTreeMap<String, Vec<u8>>,
    puts: usize,
    failing_puts: HashSet<usize>,
}

/// Object storage held in memory.
///
/// Download URLs look like hosted-storage URLs:
/// `memory://{bucket}/o/{url-encoded key}?alt=media`.
#[derive(Debug)]
pub struct MemoryObjectStorage {
    bucket: String,
    inner: Mutex<ObjectsInner>,
}

impl Default for MemoryObjectStorage {
    fn default() -> Self {
        Self::new("sportswap-test")
    }
}

impl MemoryObjectStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            inner: Mutex::new(ObjectsInner::default()),
        }
    }

    /// Fails the `index`-th `put` (0-based, counted from creation).
    pub fn fail_put_at(&self, index: usize) {
        self.lock().failing_puts.insert(index);
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().objects.get(key).cloned()
    }

    pub fn put_count(&self) -> usize {
        self.lock().puts
    }

    fn lock(&self) -> MutexGuard<'_, ObjectsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        let index = inner.puts;
        inner.puts += 1;
        if inner.failing_puts.remove(&index) {
            return Err(RemoteError::Unavailable(format!("upload of {} failed", key)));
        }
        inner.objects.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn download_url(&self, key: &str) -> Result<String, RemoteError> {
        if !self.lock().objects.contains_key(key) {
            return Err(RemoteError::ObjectNotFound(key.to_string()));
        }
        Ok(format!(
            "memory://{}/o/{}?alt=media",
            self.bucket,
            urlencoding::encode(key)
        ))
    }
}

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    email: String,
    salt: String,
    password_hash: String,
    display_name: Option<String>,
}

impl Account {
    fn session(&self) -> Session {
        let session = Session::new(&self.user_id).with_email(&self.email);
        match &self.display_name {
            Some(name) => session.with_display_name(name),
            None => session,
        }
    }
}

#[derive(Debug, Default)]
struct IdentityInner {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    failure: Option<String>,
}

/// Identity service held in memory.
#[derive(Debug, Default)]
pub struct MemoryIdentity {
    inner: Mutex<IdentityInner>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts out signed in as `user_id`.
    pub fn signed_in(user_id: &str) -> Self {
        let identity = Self::default();
        identity.lock().session = Some(Session::new(user_id));
        identity
    }

    /// Makes the next sign-in, sign-up or sign-out fail.
    pub fn fail_next(&self, message: &str) {
        self.lock().failure = Some(message.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, IdentityInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self) -> Result<MutexGuard<'_, IdentityInner>, RemoteError> {
        let mut inner = self.lock();
        match inner.failure.take() {
            Some(message) => Err(RemoteError::Unavailable(message)),
            None => Ok(inner),
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, RemoteError> {
        let mut inner = self.enter()?;
        let account = inner
            .accounts
            .get(&normalize_email(email))
            .filter(|a| a.password_hash == hash_password(&a.salt, password))
            .cloned()
            .ok_or(RemoteError::InvalidCredentials)?;
        let session = account.session();
        inner.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Session, RemoteError> {
        let mut inner = self.enter()?;
        let email = normalize_email(email);
        if inner.accounts.contains_key(&email) {
            return Err(RemoteError::EmailInUse(email));
        }
        let salt = generate_salt();
        let account = Account {
            user_id: generate_document_id(),
            email: email.clone(),
            password_hash: hash_password(&salt, password),
            salt,
            display_name: display_name.map(str::to_string),
        };
        let session = account.session();
        inner.accounts.insert(email, account);
        inner.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_in_with_google(&self, id_token: &str) -> Result<Session, RemoteError> {
        let claims = GoogleIdToken::parse(id_token)?;
        let mut inner = self.enter()?;
        let mut session = Session::new(claims.user_id());
        session.email = claims.email;
        session.display_name = claims.name;
        inner.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        self.enter()?.session = None;
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.lock().session.clone()
    }
}
