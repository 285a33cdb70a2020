//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`AccessMode`] - Totally ordered access level (`None < Read < Write < Admin`)
//! - [`UnitKind`] - Permission-scoped facet of a repository (code or wiki)
//! - [`RepositoryRef`] - Validated `owner/name` reference parsed from a command
//! - [`KeyType`] - Whether an SSH key is a user key or a deploy key
//! - [`LfsOperation`] - Git LFS transfer direction
//! - [`Verb`] - The fixed allow-list of SSH verbs
//!
//! # Validation
//!
//! These types enforce validity at construction time. A [`RepositoryRef`]
//! that exists is always safe to join onto the repository root.
//!
//! # Examples
//!
//! ```
//! use gitward::core::types::{AccessMode, RepositoryRef, UnitKind};
//!
//! let repo = RepositoryRef::parse("'Owner/Repo.wiki.git'").unwrap();
//! assert_eq!(repo.owner(), "owner");
//! assert_eq!(repo.name(), "repo");
//! assert_eq!(repo.unit(), UnitKind::Wiki);
//!
//! assert!(AccessMode::Write > AccessMode::Read);
//! assert!(RepositoryRef::parse("no-slash").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid repository path: {0}")]
    InvalidRepositoryPath(String),

    #[error("unknown verb: {0}")]
    UnknownVerb(String),

    #[error("unknown lfs operation: {0}")]
    UnknownLfsOperation(String),
}

/// Access level granted to, or requested by, a principal.
///
/// The derived `Ord` follows declaration order and is the only ordering used
/// for authorization comparisons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// No access at all.
    #[default]
    None,
    /// Clone, fetch, archive, LFS download.
    Read,
    /// Push, LFS upload.
    Write,
    /// Repository administration.
    Admin,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::None => write!(f, "none"),
            AccessMode::Read => write!(f, "read"),
            AccessMode::Write => write!(f, "write"),
            AccessMode::Admin => write!(f, "admin"),
        }
    }
}

/// Repository unit whose permission is checked.
///
/// Code and wiki permissions are independent: write access to one says
/// nothing about the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Code,
    Wiki,
}

impl UnitKind {
    /// Query-string form used by the authority API.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Code => "code",
            UnitKind::Wiki => "wiki",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of SSH key known to the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Key owned by a user account.
    User,
    /// Key bound to repositories with a fixed mode.
    Deploy,
}

/// Direction of a Git LFS transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LfsOperation {
    Upload,
    Download,
}

impl LfsOperation {
    /// Parse the sub-verb of `git-lfs-authenticate`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s {
            "upload" => Ok(LfsOperation::Upload),
            "download" => Ok(LfsOperation::Download),
            other => Err(TypeError::UnknownLfsOperation(other.to_string())),
        }
    }

    /// Access mode needed to perform this transfer.
    pub fn required_mode(&self) -> AccessMode {
        match self {
            LfsOperation::Upload => AccessMode::Write,
            LfsOperation::Download => AccessMode::Read,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LfsOperation::Upload => "upload",
            LfsOperation::Download => "download",
        }
    }
}

impl fmt::Display for LfsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The LFS authentication pseudo-verb.
pub const LFS_AUTHENTICATE_VERB: &str = "git-lfs-authenticate";

/// An allowed SSH verb.
///
/// Anything outside this set is rejected before any authority lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    UploadPack,
    UploadArchive,
    ReceivePack,
    LfsAuthenticate,
}

impl Verb {
    /// Look up a verb in the allow-list.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s {
            "git-upload-pack" => Ok(Verb::UploadPack),
            "git-upload-archive" => Ok(Verb::UploadArchive),
            "git-receive-pack" => Ok(Verb::ReceivePack),
            LFS_AUTHENTICATE_VERB => Ok(Verb::LfsAuthenticate),
            other => Err(TypeError::UnknownVerb(other.to_string())),
        }
    }

    /// The verb as it appears on the wire (and as the executable name).
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::UploadPack => "git-upload-pack",
            Verb::UploadArchive => "git-upload-archive",
            Verb::ReceivePack => "git-receive-pack",
            Verb::LfsAuthenticate => LFS_AUTHENTICATE_VERB,
        }
    }

    /// Base access mode of the verb.
    ///
    /// `LfsAuthenticate` maps to `None` until its sub-verb is known.
    pub fn base_mode(&self) -> AccessMode {
        match self {
            Verb::UploadPack | Verb::UploadArchive => AccessMode::Read,
            Verb::ReceivePack => AccessMode::Write,
            Verb::LfsAuthenticate => AccessMode::None,
        }
    }

    pub fn is_lfs(&self) -> bool {
        matches!(self, Verb::LfsAuthenticate)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated repository reference, as named by the SSH command.
///
/// Produced by lower-casing `owner/name[.wiki][.git]` and splitting it into
/// exactly two segments.
///
/// # Invariants
///
/// - `owner` and `name` are non-empty and are neither `.` nor `..`
/// - both contain only ASCII alphanumerics, `-`, `_` and `.`
/// - both are lower-case
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    owner: String,
    name: String,
    is_wiki: bool,
}

impl RepositoryRef {
    /// Parse a repository argument.
    ///
    /// Surrounding single quotes are trimmed. A `.git` suffix and then a
    /// `.wiki` suffix are stripped from the name.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::InvalidRepositoryPath`] if the argument does not
    /// split into exactly two valid segments.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let path = raw.trim().trim_matches('\'').to_lowercase();
        let invalid = || TypeError::InvalidRepositoryPath(raw.to_string());

        let mut segments = path.split('/');
        let (owner, name) = match (segments.next(), segments.next(), segments.next()) {
            (Some(owner), Some(name), None) => (owner, name),
            _ => return Err(invalid()),
        };

        let name = name.strip_suffix(".git").unwrap_or(name);
        let (name, is_wiki) = match name.strip_suffix(".wiki") {
            Some(base) => (base, true),
            None => (name, false),
        };

        if !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            is_wiki,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_wiki(&self) -> bool {
        self.is_wiki
    }

    /// Unit whose permission governs this reference.
    pub fn unit(&self) -> UnitKind {
        if self.is_wiki {
            UnitKind::Wiki
        } else {
            UnitKind::Code
        }
    }

    /// Path of the bare repository relative to the repository root.
    ///
    /// ```
    /// use gitward::core::types::RepositoryRef;
    ///
    /// let repo = RepositoryRef::parse("alice/notes.wiki").unwrap();
    /// assert_eq!(repo.relative_path(), "alice/notes.wiki.git");
    /// ```
    pub fn relative_path(&self) -> String {
        if self.is_wiki {
            format!("{}/{}.wiki.git", self.owner, self.name)
        } else {
            format!("{}/{}.git", self.owner, self.name)
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)?;
        if self.is_wiki {
            write!(f, ".wiki")?;
        }
        Ok(())
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
