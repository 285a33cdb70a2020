//! engine
//!
//! Authorization of an SSH command: Resolve -> Authorize -> Act.
//!
//! # Architecture
//!
//! 1. **Resolve** ([`resolve`]): map the verb to a requested access mode and
//!    the key argument to a principal
//! 2. **Authorize** ([`gate`]): apply the mirror, deploy key and user rules
//! 3. **Act** ([`runner`]): issue an LFS token or hand over to git
//!
//! Every step returns a [`ServError`] on failure. Only the runner turns it
//! into caller output and an exit code.
//!
//! # Invariants
//!
//! - Authorization is all-or-nothing and completes before anything runs
//! - The authority is reached only through [`AuthorityClient`]
//!
//! [`AuthorityClient`]: crate::authority::AuthorityClient

pub mod errors;
pub mod gate;
pub mod resolve;
pub mod runner;

pub use errors::ServError;
pub use gate::{AuthorizationDecision, AuthorizationEngine};
pub use resolve::{AccessRequest, AccessResolver, Principal};
pub use runner::{Gateway, ServOutcome, ServRequest};
