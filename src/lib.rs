//! gitward - SSH authorization gateway for git and Git LFS
//!
//! gitward is invoked by the SSH daemon once per connection. It reads the
//! command the client asked for, decides through an external authority
//! service whether the caller's key may perform it, and then either runs
//! the git executable with the session's stdio or hands out a short-lived
//! Git LFS token.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Resolve -> Authorize -> Act, and the single failure path
//! - [`core`] - Domain types, command parsing and configuration
//! - [`authority`] - Interface to the system of record (HTTP, mock)
//! - [`lfs`] - LFS token issuance
//! - [`git`] - Launching the git executables
//! - [`ui`] - Caller output, operator log and profiling
//!
//! # Correctness Invariants
//!
//! gitward maintains the following invariants:
//!
//! 1. Only allow-listed verbs are ever executed
//! 2. Authorization completes before any process is launched or token issued
//! 3. A deploy key never authorizes a repository it is not bound to
//! 4. Caller-facing denials never reveal whether a repository exists

pub mod authority;
pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod lfs;
pub mod ui;
