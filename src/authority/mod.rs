//! authority
//!
//! Access to the external system of record for repositories, keys, users
//! and permissions.
//!
//! # Modules
//!
//! - `traits`: [`AuthorityClient`] trait and the records it returns
//! - [`http`]: Client for the internal HTTP API
//! - [`mock`]: In-memory implementation for deterministic testing
//!
//! The gateway holds a single `&dyn AuthorityClient` for the whole
//! invocation; nothing else talks to the authority.

pub mod http;
pub mod mock;
mod traits;

pub use traits::*;
