//! engine::gate
//!
//! Authorization of a resolved principal against a repository.
//!
//! # Rules
//!
//! Evaluated in order, first deny wins:
//!
//! 1. Mirrors never accept anything above `Read`, whoever asks.
//! 2. A deploy key needs a mode at least the requested one, and must be
//!    bound to this exact repository.
//! 3. A user must be active and allowed to log in, and needs an effective
//!    permission on the unit (code or wiki) at least the requested one.
//! 4. Anonymous callers only pass on the public read fast path.
//!
//! # Invariants
//!
//! - Evaluation never produces an allowed decision when a rule denies
//! - A denial always carries the error that ends the invocation
//! - A deploy key scoped to one repository never authorizes another one,
//!   whatever its mode
//!
//! # Example
//!
//! ```ignore
//! use gitward::engine::gate::AuthorizationEngine;
//!
//! let engine = AuthorizationEngine::new(&authority, false);
//! engine.check_mirror(requested, &repo)?;
//! let decision = engine.evaluate(requested, &principal, &repo, unit).await?;
//! decision.into_result()?;
//! ```

use tracing::debug;

use super::errors::ServError;
use super::resolve::{needs_credential, Principal};
use crate::authority::{AuthorityClient, Repository};
use crate::core::types::{AccessMode, UnitKind};

/// Outcome of evaluating the rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    /// Mode the principal holds (best known value when denied early)
    pub granted: AccessMode,
    pub requested: AccessMode,
    /// Why the request was denied. `None` iff allowed.
    pub reason: Option<ServError>,
}

impl AuthorizationDecision {
    pub fn allow(granted: AccessMode, requested: AccessMode) -> Self {
        Self {
            allowed: true,
            granted,
            requested,
            reason: None,
        }
    }

    pub fn deny(granted: AccessMode, requested: AccessMode, reason: ServError) -> Self {
        Self {
            allowed: false,
            granted,
            requested,
            reason: Some(reason),
        }
    }

    /// Turn a denial into its error.
    pub fn into_result(self) -> Result<AccessMode, ServError> {
        match self.reason {
            Some(reason) => Err(reason),
            None => Ok(self.granted),
        }
    }
}

fn repo_label(repo: &Repository) -> String {
    format!("{}/{}", repo.owner_name, repo.name)
}

/// Applies the authorization rules, asking the authority for unit
/// permissions and deploy key bindings.
pub struct AuthorizationEngine<'a> {
    authority: &'a dyn AuthorityClient,
    require_signin_view: bool,
}

impl<'a> AuthorizationEngine<'a> {
    pub fn new(authority: &'a dyn AuthorityClient, require_signin_view: bool) -> Self {
        Self {
            authority,
            require_signin_view,
        }
    }

    /// Rule 1 on its own.
    ///
    /// Run before credential resolution so that a write to a mirror is
    /// reported as read-only whatever credential came with it.
    pub fn check_mirror(&self, requested: AccessMode, repo: &Repository) -> Result<(), ServError> {
        if requested > AccessMode::Read && repo.is_mirror {
            return Err(ServError::MirrorReadOnly {
                repo: repo_label(repo),
                requested,
            });
        }
        Ok(())
    }

    /// Evaluate every rule for `principal`.
    ///
    /// # Errors
    ///
    /// Only an authority failure is returned as `Err`; denials are returned
    /// as a decision with `allowed == false`.
    pub async fn evaluate(
        &self,
        requested: AccessMode,
        principal: &Principal,
        repo: &Repository,
        unit: UnitKind,
    ) -> Result<AuthorizationDecision, ServError> {
        if let Err(reason) = self.check_mirror(requested, repo) {
            return Ok(AuthorizationDecision::deny(AccessMode::Read, requested, reason));
        }

        let decision = match principal {
            Principal::Anonymous => self.evaluate_anonymous(requested, repo),
            Principal::DeployKey { key_id, mode } => {
                self.evaluate_deploy_key(requested, *key_id, *mode, repo)
                    .await?
            }
            Principal::User { user, .. } => {
                if !user.is_active || user.prohibit_login {
                    return Ok(AuthorizationDecision::deny(
                        AccessMode::None,
                        requested,
                        ServError::AccountDisabled {
                            user: user.name.clone(),
                            repo: repo_label(repo),
                        },
                    ));
                }

                let granted = self
                    .authority
                    .check_unit_permission(user.id, repo.id, user.is_admin, unit)
                    .await
                    .map_err(|e| {
                        ServError::authority(
                            format!(
                                "failed to check {} permission of user {} on repository {}",
                                unit,
                                user.name,
                                repo_label(repo)
                            ),
                            e,
                        )
                    })?;

                if granted >= requested {
                    AuthorizationDecision::allow(granted, requested)
                } else if granted >= AccessMode::Read {
                    AuthorizationDecision::deny(
                        granted,
                        requested,
                        ServError::InsufficientAccess {
                            user: user.name.clone(),
                            repo: repo_label(repo),
                            granted,
                            requested,
                        },
                    )
                } else {
                    AuthorizationDecision::deny(
                        granted,
                        requested,
                        ServError::AccessDenied {
                            user: user.name.clone(),
                            repo: repo_label(repo),
                            requested,
                        },
                    )
                }
            }
        };

        debug!(
            principal = %principal.describe(),
            repo_id = repo.id,
            %unit,
            granted = %decision.granted,
            requested = %decision.requested,
            allowed = decision.allowed,
            "authorization evaluated"
        );
        Ok(decision)
    }

    fn evaluate_anonymous(&self, requested: AccessMode, repo: &Repository) -> AuthorizationDecision {
        if needs_credential(requested, repo, self.require_signin_view) {
            AuthorizationDecision::deny(
                AccessMode::None,
                requested,
                ServError::AnonymousDenied {
                    repo: repo_label(repo),
                    requested,
                },
            )
        } else {
            AuthorizationDecision::allow(AccessMode::Read, requested)
        }
    }

    async fn evaluate_deploy_key(
        &self,
        requested: AccessMode,
        key_id: i64,
        mode: AccessMode,
        repo: &Repository,
    ) -> Result<AuthorizationDecision, ServError> {
        if mode < requested {
            return Ok(AuthorizationDecision::deny(
                mode,
                requested,
                ServError::DeployKeyPermission {
                    key_id,
                    granted: mode,
                    requested,
                },
            ));
        }

        let bound = self
            .authority
            .has_deploy_key_binding(key_id, repo.id)
            .await
            .map_err(|e| {
                ServError::authority(
                    format!("failed to check deploy key {} on repository {}", key_id, repo.id),
                    e,
                )
            })?;

        if !bound {
            return Ok(AuthorizationDecision::deny(
                AccessMode::None,
                requested,
                ServError::DeployKeyScopeMismatch {
                    key_id,
                    repo_id: repo.id,
                },
            ));
        }

        Ok(AuthorizationDecision::allow(mode, requested))
    }
}
