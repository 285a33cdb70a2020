//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! The SSH daemon runs the binary through a forced command such as
//! `command="gitward serv key-12"` in `authorized_keys`; the command the
//! client asked for arrives in `SSH_ORIGINAL_COMMAND`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Environment variable carrying the client's command.
pub const ORIGINAL_COMMAND_ENV: &str = "SSH_ORIGINAL_COMMAND";

/// gitward - SSH authorization gateway for git and Git LFS
#[derive(Parser, Debug)]
#[command(name = "gitward")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Authorize and serve one SSH command
    #[command(
        name = "serv",
        long_about = "Authorize and serve one SSH command.\n\n\
            Reads the client's command from SSH_ORIGINAL_COMMAND, checks it against \
            the authority service, then either runs the git command with the \
            session's stdio or prints a Git LFS access token.",
        after_help = "\
AUTHORIZED_KEYS EXAMPLE:
    command=\"gitward serv --config /etc/gitward/config.toml key-12\",no-port-forwarding ssh-ed25519 AAAA..."
    )]
    Serv(ServArgs),
}

/// Arguments of `gitward serv`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ServArgs {
    /// Configuration file (default: discovered)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write a profile record for this invocation
    #[arg(long)]
    pub enable_pprof: bool,

    /// Key argument, `<label>-<id>`
    #[arg(value_name = "KEY")]
    pub key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_serv() {
        let cli = Cli::try_parse_from([
            "gitward",
            "serv",
            "--config",
            "/etc/gitward.toml",
            "--enable-pprof",
            "key-12",
        ])
        .unwrap();

        let Command::Serv(args) = cli.command;
        assert_eq!(args.config, Some(PathBuf::from("/etc/gitward.toml")));
        assert!(args.enable_pprof);
        assert_eq!(args.key.as_deref(), Some("key-12"));
    }

    #[test]
    fn key_is_optional() {
        let cli = Cli::try_parse_from(["gitward", "serv"]).unwrap();
        let Command::Serv(args) = cli.command;
        assert_eq!(args.key, None);
        assert!(!args.enable_pprof);
    }
}
