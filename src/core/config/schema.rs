//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! prod_mode = true
//! app_url = "https://git.example.com/"
//! repo_root = "/var/lib/gitward/repositories"
//!
//! [ssh]
//! disabled = false
//!
//! [service]
//! require_signin_view = false
//!
//! [lfs]
//! enabled = true
//! jwt_secret = "c2VjcmV0LXNpZ25pbmcta2V5LWZvci1sZnM"
//! http_auth_expiry_secs = 1200
//!
//! [internal]
//! url = "http://127.0.0.1:3000"
//! token = "internal-api-token"
//!
//! [log]
//! root = "/var/log/gitward"
//! level = "info"
//!
//! [pprof]
//! enabled = false
//! data_path = "/var/lib/gitward/pprof"
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing: URLs must be http(s), the LFS token
//! lifetime must be positive, and LFS requires a decodable signing secret.

use std::fmt;
use std::path::PathBuf;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Gateway configuration file.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServConfig {
    /// Production mode hides detailed errors from the caller
    pub prod_mode: Option<bool>,

    /// Public base URL of the application (LFS endpoints hang off it)
    pub app_url: Option<String>,

    /// Directory holding the bare repositories
    pub repo_root: Option<PathBuf>,

    /// Rewrite `git-xxx` verbs to `git xxx` when launching
    pub windows_verbs: Option<bool>,

    pub ssh: Option<SshConfig>,
    pub service: Option<ServiceConfig>,
    pub lfs: Option<LfsConfig>,
    pub internal: Option<InternalConfig>,
    pub log: Option<LogConfig>,
    pub pprof: Option<PprofConfig>,
}

// Keeps secrets out of logs
impl fmt::Debug for ServConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServConfig")
            .field("prod_mode", &self.prod_mode)
            .field("app_url", &self.app_url)
            .field("repo_root", &self.repo_root)
            .field("windows_verbs", &self.windows_verbs)
            .field("ssh", &self.ssh)
            .field("service", &self.service)
            .field("lfs", &self.lfs)
            .field("internal", &self.internal)
            .field("log", &self.log)
            .field("pprof", &self.pprof)
            .finish()
    }
}

impl ServConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.app_url {
            validate_http_url("app_url", url)?;
        }

        if let Some(internal) = &self.internal {
            if let Some(url) = &internal.url {
                validate_http_url("internal.url", url)?;
            }
            if internal.timeout_secs == Some(0) {
                return Err(ConfigError::InvalidValue(
                    "internal.timeout_secs must be greater than zero".to_string(),
                ));
            }
        }

        if let Some(lfs) = &self.lfs {
            lfs.validate()?;
        }

        Ok(())
    }
}

fn validate_http_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(format!(
            "{} must be an http(s) URL, got '{}'",
            key, url
        )))
    }
}

/// SSH access settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SshConfig {
    /// Refuse every SSH command with a benign message
    pub disabled: Option<bool>,
}

/// Service-wide access policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Require a signed-in user even to read public repositories
    pub require_signin_view: Option<bool>,
}

/// Git LFS settings.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LfsConfig {
    /// Serve LFS (and accept `git-lfs-authenticate`)
    pub enabled: Option<bool>,

    /// HS256 signing secret, URL-safe base64 without padding
    pub jwt_secret: Option<String>,

    /// Lifetime of issued tokens in seconds
    pub http_auth_expiry_secs: Option<u64>,
}

impl fmt::Debug for LfsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfsConfig")
            .field("enabled", &self.enabled)
            .field(
                "jwt_secret",
                &self.jwt_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("http_auth_expiry_secs", &self.http_auth_expiry_secs)
            .finish()
    }
}

impl LfsConfig {
    /// Validate the LFS configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_auth_expiry_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "lfs.http_auth_expiry_secs must be greater than zero".to_string(),
            ));
        }

        if let Some(secret) = &self.jwt_secret {
            URL_SAFE_NO_PAD.decode(secret.trim_end_matches('=')).map_err(|_| {
                ConfigError::InvalidValue("lfs.jwt_secret is not valid base64".to_string())
            })?;
        }

        if self.enabled == Some(true)
            && self.jwt_secret.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::InvalidValue(
                "lfs.jwt_secret is required when lfs.enabled is true".to_string(),
            ));
        }

        Ok(())
    }
}

/// Connection to the internal authority API.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InternalConfig {
    /// Base URL of the authority service
    pub url: Option<String>,

    /// Bearer token for the internal API
    pub token: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for InternalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Operator log settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Directory receiving `serv.log`
    pub root: Option<PathBuf>,

    /// Default filter directive (overridden by `GITWARD_LOG`)
    pub level: Option<String>,
}

/// Profiling settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PprofConfig {
    pub enabled: Option<bool>,

    /// Directory receiving profile records
    pub data_path: Option<PathBuf>,
}
