//! git
//!
//! Launching the git executables for an authorized command.
//!
//! # Architecture
//!
//! This module is the only place that spawns a process. It never speaks the
//! git protocol itself: the child inherits the caller's stdin, stdout and
//! stderr, and the gateway only waits for it.
//!
//! # Invariants
//!
//! - Nothing is launched for a request that was not authorized
//! - The child's context is an explicit environment list, never ambient
//!   process state
//! - Exactly one key is touched after a successful run, and none after a
//!   failed one
//!
//! # Example
//!
//! ```ignore
//! use gitward::git::{GitDispatcher, SystemLauncher};
//!
//! let launcher = SystemLauncher;
//! let dispatcher = GitDispatcher::new(&authority, &launcher, repo_root, false);
//! dispatcher.dispatch(verb, &repo_ref, &repo, &principal).await?;
//! ```

mod dispatch;

pub use dispatch::{
    build_command, ChildContext, ChildExit, GitCommand, GitDispatcher, ProcessLauncher,
    RecordingLauncher, SystemLauncher, ENV_PROTECTED_BRANCH_REPO_ID, ENV_PUSHER_ID,
    ENV_PUSHER_NAME, ENV_REPO_ID, ENV_REPO_IS_WIKI, ENV_REPO_NAME, ENV_REPO_USER_NAME,
};
