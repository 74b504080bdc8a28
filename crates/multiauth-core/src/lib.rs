//! Core data structures for the multiauth workspace.
//!
//! This crate defines the path-addressed configuration tree, the on-disk
//! config files it is loaded from, and the credential store abstraction
//! shared by the migration engine and the status report.

pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod path;
pub mod tree;

pub use config::{resolve_config_dir, ConfigFiles};
pub use credentials::{
    keyring_service_name, CredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};
pub use error::{ConfigError, CredentialError, TreeError};
pub use path::ConfigPath;
pub use tree::{ConfigTree, Node};
