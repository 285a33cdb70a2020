//! lfs::token
//!
//! HS256 bearer tokens for LFS transfers.
//!
//! # Format
//!
//! A compact HS256 JWT (`{"alg":"HS256","typ":"JWT"}`) signed with the
//! shared LFS secret. The claims are [`LfsClaims`].
//!
//! # Security
//!
//! - A token names exactly one repository and one operation
//! - The user claim is present only for user-key sessions
//! - Neither the secret nor the token is ever logged
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use gitward::core::types::LfsOperation;
//! use gitward::lfs::LfsTokenIssuer;
//!
//! let issuer = LfsTokenIssuer::new(b"secret".to_vec(), Duration::from_secs(60), "https://git.example.com/");
//! let response = issuer
//!     .issue(7, LfsOperation::Download, Some(3), "owner", "repo", 1_700_000_000)
//!     .unwrap();
//! assert_eq!(response.href, "https://git.example.com/owner/repo.git/info/lfs");
//!
//! let token = response.header["Authorization"].trim_start_matches("Bearer ");
//! let claims = issuer.verify(token).unwrap();
//! assert_eq!(claims.repo, 7);
//! assert_eq!(claims.exp, 1_700_000_060);
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::core::types::LfsOperation;
use crate::engine::ServError;

/// Claims carried by an LFS token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfsClaims {
    /// Repository id
    pub repo: i64,
    pub op: LfsOperation,
    /// Expiry, Unix seconds
    pub exp: i64,
    /// Not before, Unix seconds
    pub nbf: i64,
    /// Acting user id, for user-key sessions only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<i64>,
}

/// JSON written to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LfsTokenResponse {
    pub header: BTreeMap<String, String>,
    pub href: String,
}

impl LfsTokenResponse {
    /// Write the response as one JSON line.
    pub fn write_to(&self, out: &mut dyn Write) -> Result<(), ServError> {
        let json = serde_json::to_string(self)
            .map_err(|e| ServError::TokenSigningFailure(format!("failed to encode response: {}", e)))?;
        writeln!(out, "{}", json)
            .and_then(|_| out.flush())
            .map_err(|e| ServError::Io(format!("failed to write LFS response: {}", e)))
    }
}

/// Builds and signs LFS tokens.
pub struct LfsTokenIssuer {
    secret: Vec<u8>,
    lifetime: Duration,
    app_url: String,
}

// Keeps the secret out of logs
impl std::fmt::Debug for LfsTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LfsTokenIssuer")
            .field("secret", &"[REDACTED]")
            .field("lifetime", &self.lifetime)
            .field("app_url", &self.app_url)
            .finish()
    }
}

impl LfsTokenIssuer {
    /// `app_url` is expected to end in `/`.
    pub fn new(secret: Vec<u8>, lifetime: Duration, app_url: impl Into<String>) -> Self {
        Self {
            secret,
            lifetime,
            app_url: app_url.into(),
        }
    }

    /// Claims for a token issued at `now` (Unix seconds).
    pub fn claims(&self, repo_id: i64, op: LfsOperation, user_id: Option<i64>, now: i64) -> LfsClaims {
        let lifetime = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        LfsClaims {
            repo: repo_id,
            op,
            exp: now.saturating_add(lifetime),
            nbf: now,
            user: user_id,
        }
    }

    /// Sign claims into a compact token.
    ///
    /// # Errors
    ///
    /// Returns [`ServError::TokenSigningFailure`] if no secret is configured
    /// or the claims cannot be encoded.
    pub fn sign(&self, claims: &LfsClaims) -> Result<String, ServError> {
        if self.secret.is_empty() {
            return Err(ServError::TokenSigningFailure(
                "no LFS signing secret configured".to_string(),
            ));
        }

        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|error| ServError::TokenSigningFailure(format!("failed to sign token: {}", error)))
    }

    /// Check the signature of a token and decode its claims.
    ///
    /// Expiry is not checked; that is the business of the LFS endpoint.
    pub fn verify(&self, token: &str) -> Result<LfsClaims, ServError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        jsonwebtoken::decode::<LfsClaims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|error| ServError::TokenSigningFailure(format!("invalid token: {}", error)))
    }

    /// Transfer endpoint of a repository.
    pub fn endpoint(&self, owner: &str, repo_name: &str) -> String {
        format!("{}{}/{}.git/info/lfs", self.app_url, owner, repo_name)
    }

    /// Build the full response for an authorized request.
    pub fn issue(
        &self,
        repo_id: i64,
        op: LfsOperation,
        user_id: Option<i64>,
        owner: &str,
        repo_name: &str,
        now: i64,
    ) -> Result<LfsTokenResponse, ServError> {
        let claims = self.claims(repo_id, op, user_id, now);
        let token = self.sign(&claims)?;

        let mut header = BTreeMap::new();
        header.insert("Authorization".to_string(), format!("Bearer {}", token));

        Ok(LfsTokenResponse {
            header,
            href: self.endpoint(owner, repo_name),
        })
    }
}
