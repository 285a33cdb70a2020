//! engine::runner
//!
//! The gateway controller: the single entry point of an invocation.
//!
//! # Architecture
//!
//! ```text
//! Parse -> Resolve repository -> Mirror check -> Resolve principal
//!       -> Authorize -> (LFS token | git dispatch + key touch)
//! ```
//!
//! **Key principle:** components return [`ServError`] values and never end
//! the process themselves. [`Gateway::run`] is the only place that turns an
//! error into a caller message, a log line and an exit code.
//!
//! # Invariants
//!
//! - An unknown verb is rejected before any authority call
//! - LFS requests while LFS is disabled are rejected before any authority
//!   call
//! - Nothing is launched and no token is issued unless authorization
//!   allowed the request
//! - Each invocation logs under a `serv` span carrying a fresh id
//!
//! # Example
//!
//! ```ignore
//! use gitward::engine::runner::{Gateway, ServRequest};
//!
//! let gateway = Gateway::new(&config, &authority, &SystemLauncher);
//! let code = gateway
//!     .run(request, &mut std::io::stdout(), &mut std::io::stderr())
//!     .await;
//! ```

use std::fmt::Display;
use std::io::Write;

use chrono::Utc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::errors::ServError;
use super::gate::AuthorizationEngine;
use super::resolve::{requested_access, AccessResolver};
use crate::authority::AuthorityClient;
use crate::core::command::SshCommand;
use crate::core::config::Config;
use crate::core::types::{RepositoryRef, Verb};
use crate::git::{GitDispatcher, ProcessLauncher};
use crate::lfs::LfsTokenIssuer;
use crate::ui::output::{self, NO_SHELL_GREETING, SSH_DISABLED};
use crate::ui::profile::ProfileGuard;

/// Input of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServRequest {
    /// Command string from the SSH layer (`SSH_ORIGINAL_COMMAND`)
    pub original_command: Option<String>,
    /// Positional `<label>-<id>` key argument
    pub key_token: Option<String>,
    /// Profile this invocation regardless of configuration
    pub enable_pprof: bool,
}

/// How a successful invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServOutcome {
    /// SSH is disabled; the caller was told so.
    Disabled,
    /// No actionable command; the caller was greeted.
    NoShell,
    /// An LFS token was written to stdout.
    LfsToken,
    /// The git child ran and exited successfully.
    Dispatched,
}

/// Orchestrates one invocation.
pub struct Gateway<'a> {
    config: &'a Config,
    authority: &'a dyn AuthorityClient,
    launcher: &'a dyn ProcessLauncher,
}

impl<'a> Gateway<'a> {
    pub fn new(
        config: &'a Config,
        authority: &'a dyn AuthorityClient,
        launcher: &'a dyn ProcessLauncher,
    ) -> Self {
        Self {
            config,
            authority,
            launcher,
        }
    }

    /// Serve a request and report any failure.
    ///
    /// Returns the process exit code: `0` on success or a benign no-op, `1`
    /// on any failure.
    pub async fn run(
        &self,
        request: ServRequest,
        out: &mut dyn Write,
        err_out: &mut dyn Write,
    ) -> u8 {
        let id = Uuid::new_v4();
        let span = info_span!("serv", id = %id);
        async {
            match self.serve_as(id, request, out).await {
                Ok(outcome) => {
                    debug!(?outcome, "invocation finished");
                    0
                }
                Err(err) => report(&err, self.config.prod_mode(), err_out),
            }
        }
        .instrument(span)
        .await
    }

    /// Serve a request, writing caller output to `out`.
    ///
    /// # Errors
    ///
    /// Returns the [`ServError`] that ends the invocation.
    pub async fn serve(
        &self,
        request: ServRequest,
        out: &mut dyn Write,
    ) -> Result<ServOutcome, ServError> {
        self.serve_as(Uuid::new_v4(), request, out).await
    }

    async fn serve_as(
        &self,
        id: Uuid,
        request: ServRequest,
        out: &mut dyn Write,
    ) -> Result<ServOutcome, ServError> {
        if self.config.ssh_disabled() {
            output::notice(out, SSH_DISABLED);
            return Ok(ServOutcome::Disabled);
        }

        let raw = request.original_command.unwrap_or_default();
        let Some(command) = SshCommand::parse(&raw) else {
            output::notice(out, NO_SHELL_GREETING);
            return Ok(ServOutcome::NoShell);
        };

        let verb = Verb::parse(command.verb())
            .map_err(|_| ServError::UnknownVerb(command.verb().to_string()))?;

        if verb.is_lfs() && !self.config.lfs_enabled() {
            return Err(ServError::LfsDisabled);
        }

        let repo_ref = RepositoryRef::parse(command.repo_path())
            .map_err(|_| ServError::InvalidRepositoryPath(command.repo_path().to_string()))?;

        let access = requested_access(verb, command.lfs_sub_verb())?;

        let _profile = if request.enable_pprof || self.config.pprof_enabled() {
            Some(ProfileGuard::start(
                &self.config.pprof_data_path(),
                repo_ref.owner(),
                id,
            )?)
        } else {
            None
        };

        info!(
            %verb,
            owner = repo_ref.owner(),
            repo = repo_ref.name(),
            wiki = repo_ref.is_wiki(),
            requested = %access.mode,
            "serving request"
        );

        let repo = self
            .authority
            .get_repository(repo_ref.owner(), repo_ref.name())
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    ServError::RepositoryNotFound {
                        owner: repo_ref.owner().to_string(),
                        name: repo_ref.name().to_string(),
                    }
                } else {
                    ServError::authority(format!("failed to get repository {}", repo_ref), e)
                }
            })?;

        let require_signin_view = self.config.require_signin_view();
        let engine = AuthorizationEngine::new(self.authority, require_signin_view);
        engine.check_mirror(access.mode, &repo)?;

        let principal = AccessResolver::new(self.authority, require_signin_view)
            .resolve(request.key_token.as_deref(), access.mode, &repo)
            .await?;

        let granted = engine
            .evaluate(access.mode, &principal, &repo, repo_ref.unit())
            .await?
            .into_result()?;

        info!(
            principal = %principal.describe(),
            %granted,
            "request authorized"
        );

        if let Some(op) = access.lfs {
            let issuer = LfsTokenIssuer::new(
                self.config.lfs_jwt_secret(),
                self.config.lfs_token_lifetime(),
                self.config.app_url(),
            );
            let response = issuer.issue(
                repo.id,
                op,
                principal.user().map(|u| u.id),
                repo_ref.owner(),
                &repo.name,
                Utc::now().timestamp(),
            )?;
            response.write_to(out)?;
            info!(%op, repo_id = repo.id, "issued LFS token");
            return Ok(ServOutcome::LfsToken);
        }

        GitDispatcher::new(
            self.authority,
            self.launcher,
            self.config.repo_root(),
            self.config.windows_verbs(),
        )
        .dispatch(verb, &repo_ref, &repo, &principal)
        .await?;

        Ok(ServOutcome::Dispatched)
    }
}

/// Log a terminal error, tell the caller, and return the exit code.
///
/// Outside production mode the detailed message is shown to the caller too.
pub fn report(err: &ServError, prod_mode: bool, err_out: &mut dyn Write) -> u8 {
    if err.is_denial() {
        warn!(kind = err.kind(), "{}", err);
    } else {
        error!(kind = err.kind(), "{}", err);
    }

    let detail = if prod_mode {
        None
    } else {
        Some(err as &dyn Display)
    };
    output::caller_error(err_out, err.user_message(), detail);
    1
}
