//! core::command
//!
//! Parsing of the command string produced by the SSH layer.
//!
//! # Design
//!
//! The command string is attacker-controlled. Parsing is purely lexical:
//! it never decides whether a verb is allowed (see [`Verb`]) and never
//! validates the repository path (see [`RepositoryRef`]). It only splits
//! the string into its parts.
//!
//! # Example
//!
//! ```
//! use gitward::core::command::SshCommand;
//!
//! let cmd = SshCommand::parse("git-upload-pack 'owner/repo.git'").unwrap();
//! assert_eq!(cmd.verb(), "git-upload-pack");
//! assert_eq!(cmd.repo_path(), "owner/repo.git");
//! assert_eq!(cmd.lfs_sub_verb(), None);
//!
//! // No space: nothing to act on.
//! assert!(SshCommand::parse("whoami").is_none());
//! ```
//!
//! [`Verb`]: crate::core::types::Verb
//! [`RepositoryRef`]: crate::core::types::RepositoryRef

use super::types::LFS_AUTHENTICATE_VERB;

/// A parsed SSH command. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshCommand {
    verb: String,
    raw_argument: String,
    repo_path: String,
    lfs_sub_verb: Option<String>,
}

impl SshCommand {
    /// Split a command string into verb and argument.
    ///
    /// Returns `None` when the string has no space, which means there is no
    /// actionable command.
    ///
    /// A single `'/` in the argument is collapsed into `'` to undo a shell
    /// quoting artifact of some clients (`'/owner/repo.git'`). The repository
    /// path is the trailing token with its quotes trimmed; for the LFS verb it
    /// is the first token, the second being the LFS sub-verb.
    pub fn parse(raw: &str) -> Option<Self> {
        let (verb, rest) = raw.split_once(' ')?;
        let raw_argument = rest.replacen("'/", "'", 1);

        let (repo_token, lfs_sub_verb) = if verb == LFS_AUTHENTICATE_VERB {
            let mut tokens = raw_argument.split_whitespace();
            let path = tokens.next().unwrap_or_default();
            (path, tokens.next().map(str::to_string))
        } else {
            (
                raw_argument.split_whitespace().last().unwrap_or_default(),
                None,
            )
        };

        Some(Self {
            verb: verb.to_string(),
            repo_path: repo_token.trim_matches('\'').to_string(),
            raw_argument,
            lfs_sub_verb,
        })
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The argument after the `'/` fix-up, before tokenizing.
    pub fn raw_argument(&self) -> &str {
        &self.raw_argument
    }

    /// Repository path argument with surrounding quotes removed.
    pub fn repo_path(&self) -> &str {
        &self.repo_path
    }

    /// The LFS sub-verb (`upload`/`download`), if this is an LFS command
    /// and one was given.
    pub fn lfs_sub_verb(&self) -> Option<&str> {
        self.lfs_sub_verb.as_deref()
    }
}
