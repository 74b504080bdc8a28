use std::path::PathBuf;

use thiserror::Error;

use crate::path::ConfigPath;

/// Errors raised while addressing a [`ConfigTree`](crate::ConfigTree).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("key not found: {path}")]
    NotFound { path: ConfigPath },

    #[error("expected a value at {path} but found a nested section")]
    NotALeaf { path: ConfigPath },

    #[error("expected a section at {path} but found a value")]
    NotAMap { path: ConfigPath },

    #[error("cannot assign a value to the root of the config")]
    EmptyPath,
}

impl TreeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("unsupported value at {path} in {file}: {kind}")]
    UnsupportedValue {
        file: PathBuf,
        path: ConfigPath,
        kind: &'static str,
    },

    #[error("unable to locate a config directory: set {0} or HOME")]
    NoConfigDir(&'static str),
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no secret stored for service {service:?} and account {account:?}")]
    NotFound { service: String, account: String },

    #[error("credential store failure: {0}")]
    Backend(String),
}
