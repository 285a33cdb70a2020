//! engine::resolve
//!
//! Turns a verb into a requested access mode, and a key argument into a
//! principal.
//!
//! # Anonymous fast path
//!
//! A credential is resolved unless all of these hold:
//! - the requested mode is `Read`
//! - the repository is public
//! - sign-in is not required to view
//!
//! When they all hold, resolution returns [`Principal::Anonymous`] without
//! calling the authority at all.
//!
//! # Example
//!
//! ```
//! use gitward::core::types::{AccessMode, Verb};
//! use gitward::engine::resolve::requested_access;
//!
//! let access = requested_access(Verb::LfsAuthenticate, Some("upload")).unwrap();
//! assert_eq!(access.mode, AccessMode::Write);
//!
//! assert!(requested_access(Verb::LfsAuthenticate, Some("delete")).is_err());
//! ```

use tracing::debug;

use super::errors::ServError;
use crate::authority::{AuthorityClient, Repository, User};
use crate::core::types::{AccessMode, KeyType, LfsOperation, Verb};

/// What a command asks to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRequest {
    pub verb: Verb,
    /// Present only for `git-lfs-authenticate`
    pub lfs: Option<LfsOperation>,
    pub mode: AccessMode,
}

/// Compute the requested mode of a verb.
///
/// The LFS verb starts at `None` and is refined by its sub-verb.
///
/// # Errors
///
/// Returns [`ServError::UnknownLfsVerb`] if the LFS sub-verb is missing or
/// unrecognized.
pub fn requested_access(verb: Verb, lfs_sub_verb: Option<&str>) -> Result<AccessRequest, ServError> {
    if !verb.is_lfs() {
        return Ok(AccessRequest {
            verb,
            lfs: None,
            mode: verb.base_mode(),
        });
    }

    let sub_verb = lfs_sub_verb.unwrap_or_default();
    let op = LfsOperation::parse(sub_verb)
        .map_err(|_| ServError::UnknownLfsVerb(sub_verb.to_string()))?;

    Ok(AccessRequest {
        verb,
        lfs: Some(op),
        mode: op.required_mode(),
    })
}

/// Resolved identity of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// No credential was resolved (public read fast path).
    Anonymous,
    /// A deploy key, with the maximum mode it was created with.
    DeployKey { key_id: i64, mode: AccessMode },
    /// A user key and the user who owns it.
    User { key_id: i64, user: User },
}

impl Principal {
    /// Name for log lines.
    pub fn describe(&self) -> String {
        match self {
            Principal::Anonymous => "anonymous".to_string(),
            Principal::DeployKey { key_id, .. } => format!("deploy-key:{}", key_id),
            Principal::User { user, .. } => format!("user:{}", user.name),
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::User { user, .. } => Some(user),
            _ => None,
        }
    }
}

/// Parse a `<label>-<id>` key argument into its numeric id.
///
/// # Errors
///
/// - [`ServError::InvalidKeyToken`] if the argument does not have exactly
///   two `-`-separated parts
/// - [`ServError::InvalidCredential`] if the id is not a positive integer
pub fn parse_key_token(token: &str) -> Result<i64, ServError> {
    let parts: Vec<&str> = token.split('-').collect();
    if parts.len() != 2 {
        return Err(ServError::InvalidKeyToken(token.to_string()));
    }

    match parts[1].parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ServError::InvalidCredential {
            token: token.to_string(),
            reason: "key id is not a positive integer".to_string(),
        }),
    }
}

/// Whether a credential must be resolved for this request.
pub fn needs_credential(requested: AccessMode, repo: &Repository, require_signin_view: bool) -> bool {
    requested > AccessMode::Read || repo.is_private || require_signin_view
}

/// Resolves the caller's credential through the authority.
pub struct AccessResolver<'a> {
    authority: &'a dyn AuthorityClient,
    require_signin_view: bool,
}

impl<'a> AccessResolver<'a> {
    pub fn new(authority: &'a dyn AuthorityClient, require_signin_view: bool) -> Self {
        Self {
            authority,
            require_signin_view,
        }
    }

    /// Resolve the principal for a request on `repo`.
    ///
    /// # Errors
    ///
    /// - [`ServError::MissingCredential`] if a credential is needed and none
    ///   was given
    /// - [`ServError::InvalidKeyToken`] / [`ServError::InvalidCredential`]
    ///   for a malformed or unknown key
    /// - [`ServError::AuthorityUnavailable`] if the authority fails
    pub async fn resolve(
        &self,
        key_token: Option<&str>,
        requested: AccessMode,
        repo: &Repository,
    ) -> Result<Principal, ServError> {
        if !needs_credential(requested, repo, self.require_signin_view) {
            debug!(repo_id = repo.id, "anonymous read of public repository");
            return Ok(Principal::Anonymous);
        }

        let token = key_token.ok_or_else(|| ServError::MissingCredential {
            repo: format!("{}/{}", repo.owner_name, repo.name),
            requested,
        })?;
        let key_id = parse_key_token(token)?;

        let key = self.authority.get_key_by_id(key_id).await.map_err(|e| {
            if e.is_not_found() {
                ServError::InvalidCredential {
                    token: token.to_string(),
                    reason: e.to_string(),
                }
            } else {
                ServError::authority(format!("failed to get key {}", key_id), e)
            }
        })?;

        match key.key_type {
            KeyType::Deploy => Ok(Principal::DeployKey {
                key_id: key.id,
                mode: key.mode,
            }),
            KeyType::User => {
                let user = self
                    .authority
                    .get_user_by_key_id(key.id)
                    .await
                    .map_err(|e| {
                        ServError::authority(format!("failed to get user by key ID({})", key.id), e)
                    })?;
                Ok(Principal::User {
                    key_id: key.id,
                    user,
                })
            }
        }
    }
}
