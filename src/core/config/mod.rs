//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first hit wins:
//! 1. `--config <path>` (must exist)
//! 2. `$GITWARD_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/gitward/config.toml`
//! 4. `~/.gitward/config.toml`
//!
//! With no file, defaults are used.
//!
//! # Example
//!
//! ```no_run
//! use gitward::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("LFS enabled: {}", config.lfs_enabled());
//! println!("App URL: {}", config.app_url());
//! ```

pub mod schema;

pub use schema::{
    InternalConfig, LfsConfig, LogConfig, PprofConfig, ServConfig, ServiceConfig, SshConfig,
};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use thiserror::Error;

/// Default public URL.
pub const DEFAULT_APP_URL: &str = "http://localhost:3000/";

/// Default authority API base URL.
pub const DEFAULT_INTERNAL_URL: &str = "http://127.0.0.1:3000";

/// Default LFS token lifetime (20 minutes).
pub const DEFAULT_LFS_EXPIRY_SECS: u64 = 1200;

/// Default authority request timeout.
pub const DEFAULT_INTERNAL_TIMEOUT_SECS: u64 = 60;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Raw file contents
    pub file: ServConfig,
    /// Path the file was loaded from (if any)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise the standard locations are
    /// searched and a missing file means defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated.
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Some(path.to_path_buf())
            }
            None => Self::discover(),
        };

        let file = match &path {
            Some(path) => Self::read_config(path)?,
            None => ServConfig::default(),
        };
        file.validate()?;

        Ok(Config { file, path })
    }

    /// Build a config from an already parsed file.
    pub fn from_file(file: ServConfig) -> Result<Config, ConfigError> {
        file.validate()?;
        Ok(Config { file, path: None })
    }

    fn discover() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("GITWARD_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("gitward/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".gitward/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    fn read_config(path: &Path) -> Result<ServConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path of the loaded file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Defaults to `false`.
    pub fn prod_mode(&self) -> bool {
        self.file.prod_mode.unwrap_or(false)
    }

    /// Public base URL, always ending in `/`.
    pub fn app_url(&self) -> String {
        let url = self.file.app_url.as_deref().unwrap_or(DEFAULT_APP_URL);
        if url.ends_with('/') {
            url.to_string()
        } else {
            format!("{}/", url)
        }
    }

    /// Defaults to the current directory.
    pub fn repo_root(&self) -> PathBuf {
        self.file
            .repo_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Defaults to whether this binary was built for Windows.
    pub fn windows_verbs(&self) -> bool {
        self.file.windows_verbs.unwrap_or(cfg!(windows))
    }

    pub fn ssh_disabled(&self) -> bool {
        self.file
            .ssh
            .as_ref()
            .and_then(|s| s.disabled)
            .unwrap_or(false)
    }

    pub fn require_signin_view(&self) -> bool {
        self.file
            .service
            .as_ref()
            .and_then(|s| s.require_signin_view)
            .unwrap_or(false)
    }

    pub fn lfs_enabled(&self) -> bool {
        self.file
            .lfs
            .as_ref()
            .and_then(|l| l.enabled)
            .unwrap_or(false)
    }

    /// Decoded LFS signing secret. Empty if unset.
    pub fn lfs_jwt_secret(&self) -> Vec<u8> {
        self.file
            .lfs
            .as_ref()
            .and_then(|l| l.jwt_secret.as_deref())
            .and_then(|s| URL_SAFE_NO_PAD.decode(s.trim_end_matches('=')).ok())
            .unwrap_or_default()
    }

    pub fn lfs_token_lifetime(&self) -> Duration {
        let secs = self
            .file
            .lfs
            .as_ref()
            .and_then(|l| l.http_auth_expiry_secs)
            .unwrap_or(DEFAULT_LFS_EXPIRY_SECS);
        Duration::from_secs(secs)
    }

    pub fn internal_url(&self) -> &str {
        self.file
            .internal
            .as_ref()
            .and_then(|i| i.url.as_deref())
            .unwrap_or(DEFAULT_INTERNAL_URL)
    }

    pub fn internal_token(&self) -> Option<&str> {
        self.file.internal.as_ref().and_then(|i| i.token.as_deref())
    }

    pub fn internal_timeout(&self) -> Duration {
        let secs = self
            .file
            .internal
            .as_ref()
            .and_then(|i| i.timeout_secs)
            .unwrap_or(DEFAULT_INTERNAL_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Defaults to `./log`.
    pub fn log_root(&self) -> PathBuf {
        self.file
            .log
            .as_ref()
            .and_then(|l| l.root.clone())
            .unwrap_or_else(|| PathBuf::from("log"))
    }

    /// Defaults to `info`.
    pub fn log_level(&self) -> &str {
        self.file
            .log
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    pub fn pprof_enabled(&self) -> bool {
        self.file
            .pprof
            .as_ref()
            .and_then(|p| p.enabled)
            .unwrap_or(false)
    }

    /// Defaults to `./data/tmp/pprof`.
    pub fn pprof_data_path(&self) -> PathBuf {
        self.file
            .pprof
            .as_ref()
            .and_then(|p| p.data_path.clone())
            .unwrap_or_else(|| PathBuf::from("data/tmp/pprof"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(!config.prod_mode());
        assert!(!config.ssh_disabled());
        assert!(!config.lfs_enabled());
        assert!(!config.require_signin_view());
        assert_eq!(config.app_url(), DEFAULT_APP_URL);
        assert_eq!(config.internal_url(), DEFAULT_INTERNAL_URL);
        assert_eq!(config.lfs_token_lifetime(), Duration::from_secs(1200));
        assert_eq!(config.log_level(), "info");
        assert!(config.lfs_jwt_secret().is_empty());
    }

    #[test]
    fn app_url_gets_trailing_slash() {
        let config = Config::from_file(ServConfig {
            app_url: Some("https://git.example.com".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.app_url(), "https://git.example.com/");
    }

    #[test]
    fn decodes_jwt_secret() {
        let config = Config::from_file(ServConfig {
            lfs: Some(LfsConfig {
                enabled: Some(true),
                jwt_secret: Some("c2VjcmV0".to_string()),
                http_auth_expiry_secs: Some(60),
            }),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.lfs_jwt_secret(), b"secret");
        assert_eq!(config.lfs_token_lifetime(), Duration::from_secs(60));
    }

    #[test]
    fn load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[ssh]\ndisabled = true").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert!(config.ssh_disabled());
        assert_eq!(config.path(), Some(file.path()));
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/gitward.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn load_invalid_toml_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml").unwrap();

        let result = Config::load(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[lfs]\nenabled = true").unwrap();

        let result = Config::load(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }
}
