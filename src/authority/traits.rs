//! authority::traits
//!
//! The authority trait and the records it returns.
//!
//! # Design
//!
//! The authority is the system of record for repositories, keys, users and
//! permissions. The gateway never touches that store directly; every fact it
//! needs arrives through [`AuthorityClient`].
//!
//! Each call is a single request/response with no retry. A transport failure
//! surfaces immediately as an error so that an outage can never turn into a
//! hung SSH session.
//!
//! # Example
//!
//! ```ignore
//! use gitward::authority::{AuthorityClient, AuthorityError};
//!
//! async fn is_public(authority: &dyn AuthorityClient) -> Result<bool, AuthorityError> {
//!     let repo = authority.get_repository("owner", "repo").await?;
//!     Ok(!repo.is_private)
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{AccessMode, KeyType, UnitKind};

/// Errors from authority calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The service could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with an error status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl AuthorityError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthorityError::NotFound(_))
    }
}

/// A repository as known to the authority. Read-only to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    /// Owner user or organization name
    pub owner_name: String,
    pub name: String,
    pub is_private: bool,
    pub is_mirror: bool,
}

/// An SSH public key record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub id: i64,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    /// Maximum mode for deploy keys; ignored for user keys
    pub mode: AccessMode,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub prohibit_login: bool,
}

/// Interface to the authority service.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`.
///
/// # Error Handling
///
/// Methods that look up a record return [`AuthorityError::NotFound`] when it
/// does not exist. Every other error means the authority could not answer.
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    /// Look up a repository by owner and name (both lower-case).
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, AuthorityError>;

    /// Look up an SSH key by its numeric id.
    async fn get_key_by_id(&self, key_id: i64) -> Result<Key, AuthorityError>;

    /// Resolve the user owning a user key.
    async fn get_user_by_key_id(&self, key_id: i64) -> Result<User, AuthorityError>;

    /// Effective permission of a user on one unit of a repository.
    async fn check_unit_permission(
        &self,
        user_id: i64,
        repo_id: i64,
        is_admin: bool,
        unit: UnitKind,
    ) -> Result<AccessMode, AuthorityError>;

    /// Whether a deploy key is attached to a repository.
    async fn has_deploy_key_binding(&self, key_id: i64, repo_id: i64)
        -> Result<bool, AuthorityError>;

    /// Record use of a deploy key on a repository.
    async fn touch_deploy_key(&self, key_id: i64, repo_id: i64) -> Result<(), AuthorityError>;

    /// Record use of a user key.
    async fn touch_user_key(&self, key_id: i64) -> Result<(), AuthorityError>;

    /// Create the wiki repository if it does not exist yet.
    async fn init_wiki_storage(&self, repo_id: i64) -> Result<(), AuthorityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_deserializes_type_field() {
        let key: Key =
            serde_json::from_str(r#"{"id":7,"type":"deploy","mode":"read"}"#).unwrap();
        assert_eq!(key.key_type, KeyType::Deploy);
        assert_eq!(key.mode, AccessMode::Read);

        let key: Key = serde_json::from_str(r#"{"id":8,"type":"user","mode":"none"}"#).unwrap();
        assert_eq!(key.key_type, KeyType::User);
    }

    #[test]
    fn authority_error_display() {
        assert_eq!(
            AuthorityError::NotFound("repository owner/repo".into()).to_string(),
            "not found: repository owner/repo"
        );
        assert_eq!(
            AuthorityError::Api {
                status: 500,
                message: "boom".into()
            }
            .to_string(),
            "API error: 500 - boom"
        );
        assert!(AuthorityError::NotFound("x".into()).is_not_found());
        assert!(!AuthorityError::Transport("x".into()).is_not_found());
    }
}
