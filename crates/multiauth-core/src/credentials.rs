//! Secure credential store abstraction.
//!
//! Tokens that are not kept in plaintext in `hosts.yml` live in a credential
//! store keyed by a service name derived from the hostname and an account.

use std::collections::HashMap;

use tracing::debug;

use crate::constants::KEYRING_SERVICE_PREFIX;
use crate::error::CredentialError;

/// Service name under which a host's tokens are stored, e.g. `gh:github.com`.
pub fn keyring_service_name(hostname: &str) -> String {
    format!("{KEYRING_SERVICE_PREFIX}{hostname}")
}

/// A lookup-only view of a secure credential store.
pub trait CredentialStore: std::fmt::Debug {
    /// Returns the secret stored for `service` and `account`.
    ///
    /// # Errors
    /// [`CredentialError::NotFound`] when nothing is stored, or
    /// [`CredentialError::Backend`] when the store itself failed.
    fn get(&self, service: &str, account: &str) -> Result<String, CredentialError>;
}

/// An in-process credential store.
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialStore {
    secrets: HashMap<(String, String), String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        service: impl Into<String>,
        account: impl Into<String>,
        secret: impl Into<String>,
    ) {
        self.secrets
            .insert((service.into(), account.into()), secret.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(
        mut self,
        service: impl Into<String>,
        account: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.insert(service, account, secret);
        self
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, service: &str, account: &str) -> Result<String, CredentialError> {
        self.secrets
            .get(&(service.to_string(), account.to_string()))
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                service: service.to_string(),
                account: account.to_string(),
            })
    }
}

/// The operating system's secure credential store.
///
/// Secrets are looked up by exactly the service and account asked for; no
/// entry is ever shared between hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringCredentialStore;

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, service: &str, account: &str) -> Result<String, CredentialError> {
        let secret = keyring::Entry::new(service, account)
            .and_then(|entry| entry.get_password())
            .map_err(|err| keyring_error(err, service, account))?;
        debug!("found stored secret for {}", service);
        Ok(secret)
    }
}

fn keyring_error(err: keyring::Error, service: &str, account: &str) -> CredentialError {
    match err {
        keyring::Error::NoEntry => CredentialError::NotFound {
            service: service.to_string(),
            account: account.to_string(),
        },
        other => CredentialError::Backend(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_name_is_prefixed_hostname() {
        assert_eq!(keyring_service_name("github.com"), "gh:github.com");
    }

    #[test]
    fn memory_store_keys_on_service_and_account() {
        let store = MemoryCredentialStore::new().with("gh:github.com", "", "gho_abc123");

        assert_eq!(store.get("gh:github.com", "").unwrap(), "gho_abc123");
        let err = store
            .get("gh:github.com", "monalisa")
            .expect_err("account is part of the key");
        assert!(matches!(err, CredentialError::NotFound { .. }));
    }

    #[test]
    fn missing_keyring_entry_is_not_found() {
        let err = keyring_error(keyring::Error::NoEntry, "gh:ghe.io", "");
        match err {
            CredentialError::NotFound { service, account } => {
                assert_eq!(service, "gh:ghe.io");
                assert_eq!(account, "");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn other_keyring_failures_are_backend_errors() {
        let err = keyring_error(
            keyring::Error::PlatformFailure("locked".into()),
            "gh:github.com",
            "",
        );
        assert!(matches!(err, CredentialError::Backend(_)));
    }

    #[test]
    fn keyring_store_keys_on_service() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let store = KeyringCredentialStore::new();

        let err = store
            .get("gh:a.example.com", "")
            .expect_err("nothing stored for this host");
        assert!(matches!(err, CredentialError::NotFound { .. }));
    }
}
