//! ui::logging
//!
//! Operator log.
//!
//! # Design
//!
//! Stdout and stderr belong to the SSH caller (and to git, once launched),
//! so the log goes to `<log_root>/serv.log`. The filter comes from
//! `GITWARD_LOG` (EnvFilter syntax) and falls back to the configured level.
//!
//! If the file cannot be opened, the log goes to stderr outside production
//! mode and nowhere in production mode.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::config::Config;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "GITWARD_LOG";

/// Name of the log file under the log root.
pub const LOG_FILE: &str = "serv.log";

/// Where the operator log ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    File(PathBuf),
    Stderr,
    Disabled,
}

fn open_log_file(config: &Config) -> std::io::Result<(PathBuf, File)> {
    let root = config.log_root();
    fs::create_dir_all(&root)?;
    let path = root.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

fn filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(config.log_level()))
}

/// Install the global subscriber.
///
/// Installing twice is harmless: the second call keeps the first
/// subscriber.
pub fn init(config: &Config) -> LogSink {
    match open_log_file(config) {
        Ok((path, file)) => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file));
            let _ = tracing_subscriber::registry()
                .with(filter(config))
                .with(layer)
                .try_init();
            LogSink::File(path)
        }
        Err(_) if !config.prod_mode() => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(filter(config))
                .with(layer)
                .try_init();
            LogSink::Stderr
        }
        Err(_) => LogSink::Disabled,
    }
}
