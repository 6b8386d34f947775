//! Credential handling shared by the local identity backends.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::RemoteError;

/// Claims read from a Google ID token.
///
/// Only the payload is decoded. The signature is not verified, so this is
/// fit for the local backends and nothing else.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GoogleIdToken {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl GoogleIdToken {
    pub fn parse(token: &str) -> Result<Self, RemoteError> {
        let mut parts = token.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => {
                return Err(RemoteError::InvalidArgument(
                    "ID token must have three segments".to_string(),
                ))
            }
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| RemoteError::InvalidArgument(format!("ID token payload: {}", e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| RemoteError::InvalidArgument(format!("ID token claims: {}", e)))
    }

    /// Stable user id for a Google subject.
    pub fn user_id(&self) -> String {
        let digest = Sha256::digest(format!("google:{}", self.sub).as_bytes());
        format!("{:x}", digest)[..28].to_string()
    }
}

/// Random salt, hex encoded.
pub fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
pub(crate) fn encode_test_id_token(sub: &str, email: &str, name: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let claims = serde_json::json!({ "sub": sub, "email": email, "name": name });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{}.{}.sig", header, payload)
}
