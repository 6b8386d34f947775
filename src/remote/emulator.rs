//! Local stand-in for the hosted services.
//!
//! Documents, accounts and the signed-in session live in
//! `{dir}/emulator.db`; blobs are files under `{dir}/blobs/`. One
//! [`EmulatorBackend`] implements all three service traits.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use super::credentials::{generate_salt, hash_password, normalize_email, GoogleIdToken};
use super::{
    generate_document_id, Document, DocumentStore, Fields, IdentityProvider, Mutation,
    ObjectStorage, RemoteError, Session,
};

/// Read-modify-write transactions take the write lock up front.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

pub struct EmulatorBackend {
    pool: SqlitePool,
    blob_dir: PathBuf,
    session: RwLock<Option<Session>>,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    fields: String,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    user_id: String,
    email: Option<String>,
    salt: Option<String>,
    password_hash: Option<String>,
    display_name: Option<String>,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    user_id: String,
    email: Option<String>,
    display_name: Option<String>,
}

impl EmulatorBackend {
    /// Opens the emulator state under `dir`, creating it if needed.
    pub async fn open(dir: &Path) -> Result<Self, RemoteError> {
        let pool = crate::db::connect(&dir.join("emulator.db"))
            .await
            .map_err(|e| RemoteError::Storage(e.to_string()))?;
        sqlx::migrate!("./migrations/emulator")
            .run(&pool)
            .await
            .map_err(|e| RemoteError::Storage(e.to_string()))?;

        let blob_dir = dir.join("blobs");
        tokio::fs::create_dir_all(&blob_dir).await?;

        let row: Option<SessionRow> =
            sqlx::query_as("SELECT user_id, email, display_name FROM session WHERE slot = 0")
                .fetch_optional(&pool)
                .await?;
        let session = row.map(|r| Session {
            user_id: r.user_id,
            email: r.email,
            display_name: r.display_name,
        });

        tracing::debug!("Opened emulator at {}", dir.display());

        Ok(Self {
            pool,
            blob_dir,
            session: RwLock::new(session),
        })
    }

    async fn store_session(&self, session: &Session) -> Result<(), RemoteError> {
        sqlx::query(
            "INSERT OR REPLACE INTO session (slot, user_id, email, display_name) VALUES (0, ?, ?, ?)",
        )
        .bind(&session.user_id)
        .bind(&session.email)
        .bind(&session.display_name)
        .execute(&self.pool)
        .await?;
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    async fn find_account(&self, email: &str) -> Result<Option<AccountRow>, RemoteError> {
        let row = sqlx::query_as(
            "SELECT user_id, email, salt, password_hash, display_name FROM accounts WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf, RemoteError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(RemoteError::InvalidArgument(format!(
                "invalid object key '{}'",
                key
            )));
        }
        Ok(self.blob_dir.join(relative))
    }
}

fn parse_fields(text: &str) -> Result<Fields, RemoteError> {
    Ok(serde_json::from_str(text)?)
}

fn to_document(row: DocumentRow) -> Result<Document, RemoteError> {
    let fields = parse_fields(&row.fields)?;
    Ok(Document::new(row.id, fields))
}

#[async_trait]
impl DocumentStore for EmulatorBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError> {
        let row: Option<DocumentRow> =
            sqlx::query_as("SELECT id, fields FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(to_document).transpose()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, RemoteError> {
        let rows: Vec<DocumentRow> =
            sqlx::query_as("SELECT id, fields FROM documents WHERE collection = ? ORDER BY id")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(to_document).collect()
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, RemoteError> {
        let docs = self.list(collection).await?;
        Ok(docs
            .into_iter()
            .filter(|doc| doc.fields.get(field) == Some(value))
            .collect())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, RemoteError> {
        let id = generate_document_id();
        sqlx::query("INSERT INTO documents (collection, id, fields) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(serde_json::to_string(&fields)?)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RemoteError> {
        sqlx::query("INSERT OR REPLACE INTO documents (collection, id, fields) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(id)
            .bind(serde_json::to_string(&fields)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), RemoteError> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT fields FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let mut existing = match row {
            Some((text,)) => parse_fields(&text)?,
            None => {
                return Err(RemoteError::DocumentNotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })
            }
        };
        existing.extend(fields);

        sqlx::query("UPDATE documents SET fields = ? WHERE collection = ? AND id = ?")
            .bind(serde_json::to_string(&existing)?)
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn transact(
        &self,
        collection: &str,
        id: &str,
        mutate: Mutation<'_>,
    ) -> Result<(), RemoteError> {
        let mut tx = self.pool.begin_with(BEGIN_WRITE).await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT fields FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = row.map(|(text,)| parse_fields(&text)).transpose()?;

        if let Some(fields) = mutate(current)? {
            sqlx::query(
                "INSERT OR REPLACE INTO documents (collection, id, fields) VALUES (?, ?, ?)",
            )
            .bind(collection)
            .bind(id)
            .bind(serde_json::to_string(&fields)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for EmulatorBackend {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), RemoteError> {
        let path = self.blob_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn download_url(&self, key: &str) -> Result<String, RemoteError> {
        let path = self.blob_path(key)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(RemoteError::ObjectNotFound(key.to_string()));
        }
        let absolute = tokio::fs::canonicalize(&path).await?;
        Ok(format!("file://{}", absolute.display()))
    }
}

#[async_trait]
impl IdentityProvider for EmulatorBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, RemoteError> {
        let account = self
            .find_account(&normalize_email(email))
            .await?
            .ok_or(RemoteError::InvalidCredentials)?;

        let matches = match (&account.salt, &account.password_hash) {
            (Some(salt), Some(hash)) => hash_password(salt, password) == *hash,
            _ => false,
        };
        if !matches {
            return Err(RemoteError::InvalidCredentials);
        }

        let session = Session {
            user_id: account.user_id,
            email: account.email,
            display_name: account.display_name,
        };
        self.store_session(&session).await?;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Session, RemoteError> {
        let email = normalize_email(email);
        if self.find_account(&email).await?.is_some() {
            return Err(RemoteError::EmailInUse(email));
        }

        let user_id = generate_document_id();
        let salt = generate_salt();
        sqlx::query(
            r#"
            INSERT INTO accounts (user_id, email, provider, salt, password_hash, display_name, created_at)
            VALUES (?, ?, 'password', ?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&email)
        .bind(&salt)
        .bind(hash_password(&salt, password))
        .bind(display_name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let session = Session {
            user_id,
            email: Some(email),
            display_name: display_name.map(str::to_string),
        };
        self.store_session(&session).await?;
        Ok(session)
    }

    async fn sign_in_with_google(&self, id_token: &str) -> Result<Session, RemoteError> {
        let claims = GoogleIdToken::parse(id_token)?;
        let user_id = claims.user_id();
        let email = claims.email.as_deref().map(normalize_email);

        if let Some(email) = &email {
            if let Some(account) = self.find_account(email).await? {
                if account.user_id != user_id {
                    return Err(RemoteError::EmailInUse(email.clone()));
                }
            }
        }

        sqlx::query(
            r#"
            INSERT INTO accounts (user_id, email, provider, display_name, created_at)
            VALUES (?, ?, 'google', ?, ?)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(&user_id)
        .bind(&email)
        .bind(&claims.name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let session = Session {
            user_id,
            email,
            display_name: claims.name,
        };
        self.store_session(&session).await?;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        sqlx::query("DELETE FROM session WHERE slot = 0")
            .execute(&self.pool)
            .await?;
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
