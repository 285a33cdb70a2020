//! engine::errors
//!
//! Terminal errors of a gateway invocation.
//!
//! # Design
//!
//! Every variant is terminal: nothing is retried or recovered locally.
//! Each error has two renderings:
//!
//! - [`ServError::user_message`]: the short text shown to the SSH client.
//!   Deliberately coarse for denials, so that an unauthorized caller cannot
//!   tell a missing repository from a forbidden one.
//! - `Display`: the detailed text for the operator log.
//!
//! [`ServError::kind`] gives a stable label for the log's `kind` field.
//!
//! # Example
//!
//! ```
//! use gitward::engine::ServError;
//!
//! let err = ServError::RepositoryNotFound {
//!     owner: "owner".to_string(),
//!     name: "secret".to_string(),
//! };
//! assert_eq!(err.kind(), "repository_not_found");
//! assert!(!err.user_message().contains("secret"));
//! assert!(err.to_string().contains("owner/secret"));
//! ```

use thiserror::Error;

use crate::authority::AuthorityError;
use crate::core::types::AccessMode;

/// Message shown for every denial that must not reveal whether a
/// repository exists.
pub const ACCESS_DENIED: &str = "Repository does not exist or you do not have access";

/// Message shown when a user has some access, but not enough.
pub const INSUFFICIENT_ACCESS: &str = "You do not have sufficient authorization for this action";

const INTERNAL_ERROR: &str = "Internal error";

/// Errors that end a gateway invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServError {
    /// The repository argument is not `owner/name`.
    #[error("invalid repository path: {0}")]
    InvalidRepositoryPath(String),

    /// The command string from the SSH layer is not valid UTF-8.
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    /// The key argument is not `<label>-<id>`.
    #[error("invalid key argument: {0}")]
    InvalidKeyToken(String),

    /// A credential is needed but no key argument was passed.
    #[error("no key argument given for {requested} access to {repo}")]
    MissingCredential { repo: String, requested: AccessMode },

    /// The verb is not in the allow-list.
    #[error("unknown git command {0}")]
    UnknownVerb(String),

    /// LFS authentication was requested while LFS is disabled.
    #[error("LFS authentication request over SSH denied, LFS support is disabled")]
    LfsDisabled,

    /// The LFS sub-verb is neither `upload` nor `download`.
    #[error("unknown lfs verb {0:?}")]
    UnknownLfsVerb(String),

    #[error("repository does not exist: {owner}/{name}")]
    RepositoryNotFound { owner: String, name: String },

    /// The authority could not answer.
    #[error("{context}: {source}")]
    AuthorityUnavailable {
        context: String,
        #[source]
        source: AuthorityError,
    },

    /// The key id does not name a known key.
    #[error("invalid key ID [{token}]: {reason}")]
    InvalidCredential { token: String, reason: String },

    #[error("user {user} is disabled and has no access to repository {repo}")]
    AccountDisabled { user: String, repo: String },

    #[error("mirror repository {repo} is read-only; {requested} access requested")]
    MirrorReadOnly { repo: String, requested: AccessMode },

    /// Anonymous access outside the public-read case.
    #[error("anonymous {requested} access to repository {repo} denied")]
    AnonymousDenied { repo: String, requested: AccessMode },

    /// The user has no access at all.
    #[error("user {user} does not have level {requested} access to repository {repo} (has none)")]
    AccessDenied {
        user: String,
        repo: String,
        requested: AccessMode,
    },

    /// The user has some access, but less than requested.
    #[error(
        "user {user} does not have level {requested} access to repository {repo} (has {granted})"
    )]
    InsufficientAccess {
        user: String,
        repo: String,
        granted: AccessMode,
        requested: AccessMode,
    },

    #[error("deploy key {key_id} has mode {granted}, {requested} requested")]
    DeployKeyPermission {
        key_id: i64,
        granted: AccessMode,
        requested: AccessMode,
    },

    #[error("deploy key access denied: [key_id: {key_id}, repo_id: {repo_id}]")]
    DeployKeyScopeMismatch { key_id: i64, repo_id: i64 },

    #[error("failed to sign LFS token: {0}")]
    TokenSigningFailure(String),

    #[error("failed to init wiki repo {repo_id}: {source}")]
    WikiInit {
        repo_id: i64,
        #[source]
        source: AuthorityError,
    },

    #[error("failed to execute git command: {0}")]
    SubprocessFailure(String),

    /// Local I/O needed by the invocation failed (profile directory, stdout).
    #[error("{0}")]
    Io(String),
}

impl ServError {
    /// Short message shown to the SSH client.
    pub fn user_message(&self) -> &'static str {
        match self {
            ServError::InvalidRepositoryPath(_) => "Invalid repository path",
            ServError::MalformedCommand(_) => "Invalid command",
            ServError::InvalidKeyToken(_) | ServError::MissingCredential { .. } => {
                "Key ID format error"
            }
            ServError::UnknownVerb(_) | ServError::LfsDisabled => "Unknown git command",
            ServError::UnknownLfsVerb(_) => "Unknown LFS verb",
            ServError::RepositoryNotFound { .. }
            | ServError::AccessDenied { .. }
            | ServError::AnonymousDenied { .. } => ACCESS_DENIED,
            ServError::InsufficientAccess { .. } => INSUFFICIENT_ACCESS,
            ServError::InvalidCredential { .. } => "Invalid key ID",
            ServError::AccountDisabled { .. } => {
                "Your account is not active or has been disabled by Administrator"
            }
            ServError::MirrorReadOnly { .. } => "mirror repository is read-only",
            ServError::DeployKeyPermission { .. } => "Key permission denied",
            ServError::DeployKeyScopeMismatch { .. } => "Key access denied",
            ServError::AuthorityUnavailable { .. }
            | ServError::TokenSigningFailure(_)
            | ServError::WikiInit { .. }
            | ServError::SubprocessFailure(_)
            | ServError::Io(_) => INTERNAL_ERROR,
        }
    }

    /// Stable label for the operator log.
    pub fn kind(&self) -> &'static str {
        match self {
            ServError::InvalidRepositoryPath(_)
            | ServError::MalformedCommand(_)
            | ServError::InvalidKeyToken(_)
            | ServError::MissingCredential { .. } => "malformed_command",
            ServError::UnknownVerb(_) | ServError::LfsDisabled => "unknown_verb",
            ServError::UnknownLfsVerb(_) => "unknown_lfs_verb",
            ServError::RepositoryNotFound { .. } => "repository_not_found",
            ServError::AuthorityUnavailable { .. } => "authority_unavailable",
            ServError::InvalidCredential { .. } => "invalid_credential",
            ServError::AccountDisabled { .. } => "account_disabled",
            ServError::MirrorReadOnly { .. } => "mirror_read_only",
            ServError::AnonymousDenied { .. } | ServError::AccessDenied { .. } => {
                "access_denied"
            }
            ServError::InsufficientAccess { .. } => "insufficient_access",
            ServError::DeployKeyPermission { .. } => "deploy_key_permission",
            ServError::DeployKeyScopeMismatch { .. } => "deploy_key_scope_mismatch",
            ServError::TokenSigningFailure(_) => "token_signing_failure",
            ServError::WikiInit { .. } => "wiki_init",
            ServError::SubprocessFailure(_) => "subprocess_failure",
            ServError::Io(_) => "io",
        }
    }

    /// Whether this error is an authorization decision (as opposed to a
    /// malformed request or an internal failure).
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            ServError::RepositoryNotFound { .. }
                | ServError::InvalidCredential { .. }
                | ServError::AccountDisabled { .. }
                | ServError::MirrorReadOnly { .. }
                | ServError::AnonymousDenied { .. }
                | ServError::AccessDenied { .. }
                | ServError::InsufficientAccess { .. }
                | ServError::DeployKeyPermission { .. }
                | ServError::DeployKeyScopeMismatch { .. }
        )
    }

    /// Wrap an authority failure with what was being attempted.
    pub fn authority(context: impl Into<String>, source: AuthorityError) -> Self {
        ServError::AuthorityUnavailable {
            context: context.into(),
            source,
        }
    }
}
