//! lfs
//!
//! Git LFS transfer delegation over SSH.
//!
//! `git-lfs-authenticate` does not run git. Once authorized, the gateway
//! hands the client a short-lived bearer token and the HTTP endpoint to
//! present it to. See [`token`].

pub mod token;

pub use token::{LfsClaims, LfsTokenIssuer, LfsTokenResponse};
