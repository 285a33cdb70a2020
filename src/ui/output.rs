//! ui::output
//!
//! Caller-facing output.
//!
//! # Design
//!
//! Every line the SSH client sees is prefixed with the program name, so
//! that it is recognizable among git's own messages. Messages go to the
//! writer they are given, which lets the runner be tested against
//! in-memory buffers.

use std::fmt::Display;
use std::io::Write;

/// Prefix of every caller-facing line.
pub const PREFIX: &str = "gitward";

/// Greeting for a session that authenticated but asked for no command.
pub const NO_SHELL_GREETING: &str =
    "Hi there! You've successfully authenticated, but gitward does not provide shell access.";

/// Shown when SSH access is turned off.
pub const SSH_DISABLED: &str = "SSH has been disabled";

/// Write an informational line.
pub fn notice(out: &mut dyn Write, message: impl Display) {
    let _ = writeln!(out, "{}: {}", PREFIX, message);
    let _ = out.flush();
}

/// Write the line explaining a failed invocation.
///
/// `detail` is appended only outside production mode.
pub fn caller_error(err: &mut dyn Write, message: impl Display, detail: Option<&dyn Display>) {
    let _ = writeln!(err, "{}: {}", PREFIX, message);
    if let Some(detail) = detail {
        let _ = writeln!(err, "{}: {}", PREFIX, detail);
    }
    let _ = err.flush();
}

/// Print a setup error (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_is_prefixed() {
        let mut out = Vec::new();
        notice(&mut out, SSH_DISABLED);
        assert_eq!(String::from_utf8(out).unwrap(), "gitward: SSH has been disabled\n");
    }

    #[test]
    fn caller_error_detail_is_optional() {
        let mut err = Vec::new();
        caller_error(&mut err, "Internal error", None);
        assert_eq!(String::from_utf8(err).unwrap(), "gitward: Internal error\n");

        let mut err = Vec::new();
        let detail = "connection refused";
        caller_error(&mut err, "Internal error", Some(&detail));
        let text = String::from_utf8(err).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("connection refused"));
    }
}
