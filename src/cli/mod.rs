//! cli
//!
//! Command-line interface layer for gitward.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments
//! - Load configuration and install the operator log
//! - Build the authority client and the runtime, then hand over to
//!   [`crate::engine::runner`]
//!
//! # Architecture
//!
//! The CLI layer is thin. Setup failures are `anyhow` errors reported by
//! `main`; everything after setup is the gateway's business, including
//! turning its own failures into an exit code.

pub mod args;

pub use args::{Cli, Command, ServArgs, ORIGINAL_COMMAND_ENV};

use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::debug;

use crate::authority::http::HttpAuthority;
use crate::core::config::Config;
use crate::engine::runner::report;
use crate::engine::{Gateway, ServError, ServRequest};
use crate::git::SystemLauncher;
use crate::ui::logging;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();

    match cli.command {
        Command::Serv(args) => serv(args),
    }
}

fn serv(args: ServArgs) -> Result<ExitCode> {
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    let sink = logging::init(&config);
    debug!(?sink, path = ?config.path(), "configuration loaded");

    let authority = HttpAuthority::new(
        config.internal_url(),
        config.internal_token(),
        config.internal_timeout(),
    )
    .context("failed to create authority client")?;

    let original_command = match original_command(std::env::var_os(ORIGINAL_COMMAND_ENV)) {
        Ok(command) => command,
        // A disabled gateway ignores the command entirely.
        Err(_) if config.ssh_disabled() => None,
        Err(err) => {
            let code = report(&err, config.prod_mode(), &mut std::io::stderr());
            return Ok(ExitCode::from(code));
        }
    };

    let request = ServRequest {
        original_command,
        key_token: args.key,
        enable_pprof: args.enable_pprof,
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let launcher = SystemLauncher;
    let gateway = Gateway::new(&config, &authority, &launcher);

    let code = runtime.block_on(gateway.run(
        request,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    ));
    Ok(ExitCode::from(code))
}

/// Decode the command string handed over by the SSH layer.
fn original_command(raw: Option<OsString>) -> Result<Option<String>, ServError> {
    raw.map(|raw| {
        raw.into_string().map_err(|raw| {
            ServError::MalformedCommand(format!(
                "{} is not valid UTF-8: {:?}",
                ORIGINAL_COMMAND_ENV, raw
            ))
        })
    })
    .transpose()
}
