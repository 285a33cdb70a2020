//! ui
//!
//! Everything the gateway emits besides git's own streams.
//!
//! # Modules
//!
//! - [`output`] - Caller-facing messages on stdout/stderr
//! - [`logging`] - Operator log (tracing subscriber)
//! - [`profile`] - Optional per-invocation profile records
//!
//! # Design
//!
//! The SSH caller sees short, fixed messages. The operator log gets the
//! details. These two channels never mix: nothing logged is ever shown to
//! the caller, and a log sink failure never surfaces on stderr in
//! production mode.

pub mod logging;
pub mod output;
pub mod profile;
