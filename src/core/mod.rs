//! core
//!
//! Core domain types, command parsing and configuration for gitward.
//!
//! # Modules
//!
//! - [`types`] - Strong types: AccessMode, Verb, RepositoryRef, etc.
//! - [`command`] - Lexical parsing of the SSH command string
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at construction time
//! - Parsing never consults the authority
//! - Schemas are strict and self-describing

pub mod command;
pub mod config;
pub mod types;
