//! git::dispatch
//!
//! Verb to executable mapping, child context and the launch itself.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::authority::{AuthorityClient, Repository};
use crate::core::types::{RepositoryRef, Verb};
use crate::engine::resolve::Principal;
use crate::engine::ServError;

pub const ENV_REPO_USER_NAME: &str = "GITWARD_REPO_USER_NAME";
pub const ENV_REPO_NAME: &str = "GITWARD_REPO_NAME";
pub const ENV_REPO_IS_WIKI: &str = "GITWARD_REPO_IS_WIKI";
pub const ENV_REPO_ID: &str = "GITWARD_REPO_ID";
pub const ENV_PROTECTED_BRANCH_REPO_ID: &str = "GITWARD_PROTECTED_BRANCH_REPO_ID";
pub const ENV_PUSHER_NAME: &str = "GITWARD_PUSHER_NAME";
pub const ENV_PUSHER_ID: &str = "GITWARD_PUSHER_ID";

/// Context handed to the git child, for hooks running inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildContext {
    pub repo_owner: String,
    pub repo_name: String,
    pub is_wiki: bool,
    pub repo_id: i64,
    /// `(name, id)` of the acting user, for user-key sessions
    pub pusher: Option<(String, i64)>,
}

impl ChildContext {
    pub fn new(repo_ref: &RepositoryRef, repo: &Repository, principal: &Principal) -> Self {
        Self {
            repo_owner: repo_ref.owner().to_string(),
            repo_name: repo_ref.name().to_string(),
            is_wiki: repo_ref.is_wiki(),
            repo_id: repo.id,
            pusher: principal.user().map(|u| (u.name.clone(), u.id)),
        }
    }

    /// The environment entries, in a fixed order.
    pub fn env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            (ENV_REPO_USER_NAME.to_string(), self.repo_owner.clone()),
            (ENV_REPO_NAME.to_string(), self.repo_name.clone()),
            (ENV_REPO_IS_WIKI.to_string(), self.is_wiki.to_string()),
            (ENV_REPO_ID.to_string(), self.repo_id.to_string()),
            (
                ENV_PROTECTED_BRANCH_REPO_ID.to_string(),
                self.repo_id.to_string(),
            ),
        ];
        if let Some((name, id)) = &self.pusher {
            env.push((ENV_PUSHER_NAME.to_string(), name.clone()));
            env.push((ENV_PUSHER_ID.to_string(), id.to_string()));
        }
        env
    }
}

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

/// Map a verb to a command line against `repo_ref`.
///
/// With `windows_verbs`, the first `-` of the verb becomes a space, so
/// `git-upload-pack` runs as `git upload-pack`.
///
/// ```
/// use std::path::Path;
/// use gitward::core::types::{RepositoryRef, Verb};
/// use gitward::git::build_command;
///
/// let repo = RepositoryRef::parse("owner/repo.git").unwrap();
/// let cmd = build_command(Verb::UploadPack, &repo, Path::new("/srv/git"), true, Vec::new());
/// assert_eq!(cmd.program, "git");
/// assert_eq!(cmd.args, vec!["upload-pack", "owner/repo.git"]);
/// ```
pub fn build_command(
    verb: Verb,
    repo_ref: &RepositoryRef,
    repo_root: &Path,
    windows_verbs: bool,
    env: Vec<(String, String)>,
) -> GitCommand {
    let verb = if windows_verbs {
        verb.as_str().replacen('-', " ", 1)
    } else {
        verb.as_str().to_string()
    };

    let mut words = verb.split_whitespace().map(str::to_string);
    let program = words.next().unwrap_or_default();
    let mut args: Vec<String> = words.collect();
    args.push(repo_ref.relative_path());

    GitCommand {
        program,
        args,
        current_dir: repo_root.to_path_buf(),
        env,
    }
}

/// Exit status of a finished child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// `None` if the child was killed by a signal
    pub code: Option<i32>,
}

impl ChildExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a command to completion.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, command: &GitCommand) -> io::Result<ChildExit>;
}

/// Launches real processes wired to this process's stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&self, command: &GitCommand) -> io::Result<ChildExit> {
        let status = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.current_dir)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;

        Ok(ChildExit {
            code: status.code(),
        })
    }
}

/// Launcher that records commands instead of running them.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    exit_code: i32,
    launched: Mutex<Vec<GitCommand>>,
}

impl RecordingLauncher {
    /// Every launch "exits" with `exit_code`.
    pub fn new(exit_code: i32) -> Self {
        Self {
            exit_code,
            launched: Mutex::new(Vec::new()),
        }
    }

    pub fn launched(&self) -> Vec<GitCommand> {
        self.launched
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn launch(&self, command: &GitCommand) -> io::Result<ChildExit> {
        self.launched
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "launcher lock poisoned"))?
            .push(command.clone());
        Ok(ChildExit {
            code: Some(self.exit_code),
        })
    }
}

/// Runs an authorized git verb and does the bookkeeping around it.
pub struct GitDispatcher<'a> {
    authority: &'a dyn AuthorityClient,
    launcher: &'a dyn ProcessLauncher,
    repo_root: PathBuf,
    windows_verbs: bool,
}

impl<'a> GitDispatcher<'a> {
    pub fn new(
        authority: &'a dyn AuthorityClient,
        launcher: &'a dyn ProcessLauncher,
        repo_root: PathBuf,
        windows_verbs: bool,
    ) -> Self {
        Self {
            authority,
            launcher,
            repo_root,
            windows_verbs,
        }
    }

    /// Initialize wiki storage if needed, run the verb, then touch the key
    /// that authenticated the session.
    ///
    /// # Errors
    ///
    /// - [`ServError::WikiInit`] if the wiki cannot be created
    /// - [`ServError::SubprocessFailure`] if the child cannot be started or
    ///   exits non-zero (no key is touched then)
    /// - [`ServError::AuthorityUnavailable`] if the touch fails
    pub async fn dispatch(
        &self,
        verb: Verb,
        repo_ref: &RepositoryRef,
        repo: &Repository,
        principal: &Principal,
    ) -> Result<(), ServError> {
        if repo_ref.is_wiki() {
            self.authority
                .init_wiki_storage(repo.id)
                .await
                .map_err(|source| ServError::WikiInit {
                    repo_id: repo.id,
                    source,
                })?;
        }

        let context = ChildContext::new(repo_ref, repo, principal);
        let command = build_command(
            verb,
            repo_ref,
            &self.repo_root,
            self.windows_verbs,
            context.env(),
        );

        info!(
            program = %command.program,
            args = ?command.args,
            "launching git"
        );
        let exit = self
            .launcher
            .launch(&command)
            .map_err(|e| ServError::SubprocessFailure(format!("{}: {}", verb, e)))?;

        if !exit.success() {
            return Err(ServError::SubprocessFailure(match exit.code {
                Some(code) => format!("{} exited with status {}", verb, code),
                None => format!("{} was terminated by a signal", verb),
            }));
        }
        debug!("git exited successfully");

        self.touch_key(principal, repo).await
    }

    async fn touch_key(&self, principal: &Principal, repo: &Repository) -> Result<(), ServError> {
        match principal {
            Principal::Anonymous => Ok(()),
            Principal::DeployKey { key_id, .. } => self
                .authority
                .touch_deploy_key(*key_id, repo.id)
                .await
                .map_err(|e| ServError::authority(format!("failed to update deploy key {}", key_id), e)),
            Principal::User { key_id, .. } => self
                .authority
                .touch_user_key(*key_id)
                .await
                .map_err(|e| ServError::authority(format!("failed to update public key {}", key_id), e)),
        }
    }
}
