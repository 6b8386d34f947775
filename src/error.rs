//! Error types surfaced to callers of the repositories and services.

use thiserror::Error;

use crate::remote::RemoteError;

/// Errors carried by [`Resource::Error`](crate::resource::Resource::Error).
///
/// `Display` is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SwapError {
    /// No identity session is active.
    #[error("not authenticated")]
    Unauthenticated,

    /// A single-document read found nothing.
    #[error("{0}")]
    NotFound(String),

    /// A call to a remote service failed.
    #[error("{context}: {source}")]
    Remote {
        context: &'static str,
        #[source]
        source: RemoteError,
    },

    /// The identity provider rejected the request.
    #[error("{0}")]
    Auth(String),

    /// The on-device store failed.
    #[error("Local store error: {0}")]
    Local(String),
}

impl SwapError {
    pub fn remote(context: &'static str, source: RemoteError) -> Self {
        SwapError::Remote { context, source }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, SwapError::Unauthenticated)
    }
}

impl From<crate::db::StoreError> for SwapError {
    fn from(e: crate::db::StoreError) -> Self {
        SwapError::Local(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_displays_bare_message() {
        let err = SwapError::NotFound("Item not found".to_string());
        assert_eq!(err.to_string(), "Item not found");
    }

    #[test]
    fn test_remote_error_includes_context() {
        let err = SwapError::remote(
            "Failed to upload item",
            RemoteError::Unavailable("connection reset".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Failed to upload item: service unavailable: connection reset"
        );
    }

    #[test]
    fn test_unauthenticated_is_distinguishable() {
        assert!(SwapError::Unauthenticated.is_unauthenticated());
        assert!(!SwapError::Auth("bad password".into()).is_unauthenticated());
        assert_eq!(SwapError::Unauthenticated.to_string(), "not authenticated");
    }
}
