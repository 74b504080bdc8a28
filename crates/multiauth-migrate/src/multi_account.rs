//! Moves each host's settings under a per-account namespace.
//!
//! A hosts section of the form
//!
//! ```yaml
//! github.com:
//!     user: monalisa
//!     git_protocol: https
//!     oauth_token: gho_abc123
//! ```
//!
//! gains a copy of every field except `user` under `users.<login>`:
//!
//! ```yaml
//! github.com:
//!     user: monalisa
//!     git_protocol: https
//!     oauth_token: gho_abc123
//!     users:
//!         monalisa:
//!             git_protocol: https
//!             oauth_token: gho_abc123
//! ```
//!
//! The original fields are left in place so that readers unaware of the
//! `users` namespace keep working. The only overwrite is replacing an
//! anonymous `user` with the login the token actually belongs to.

use multiauth_core::constants::{OAUTH_TOKEN_KEY, USERS_KEY, USER_KEY};
use multiauth_core::{
    keyring_service_name, ConfigPath, ConfigTree, CredentialError, CredentialStore, Node,
};
use tracing::{debug, info, instrument, warn};

use crate::error::RefusalError;
use crate::login::Login;
use crate::migration::Migration;
use crate::resolver::UsernameResolver;

#[derive(Debug)]
pub struct MultiAccount {
    resolver: Box<dyn UsernameResolver>,
    credentials: Box<dyn CredentialStore>,
}

impl MultiAccount {
    /// `resolver` is only consulted for hosts whose `user` is anonymous;
    /// `credentials` only when such a host has no plaintext token.
    pub fn new(resolver: Box<dyn UsernameResolver>, credentials: Box<dyn CredentialStore>) -> Self {
        Self {
            resolver,
            credentials,
        }
    }

    #[instrument(skip(self, tree))]
    fn migrate_host(&self, tree: &mut ConfigTree, hostname: &str) -> Result<(), RefusalError> {
        let host = ConfigPath::host(hostname);
        let keys = tree.keys(&host).map_err(|_| {
            RefusalError::new(format!(
                "couldn't get host configuration despite {hostname:?} existing"
            ))
        })?;

        let login = tree
            .lookup(&host.child(USER_KEY))
            .ok()
            .flatten()
            .and_then(Login::parse)
            .ok_or_else(|| RefusalError::new(format!("couldn't get user name for {hostname:?}")))?;

        // Everything is checked before the first write so a refusal leaves
        // this host untouched.
        let fields = collect_fields(tree, hostname, &keys)?;

        let username = match login {
            Login::Named(name) => name,
            Login::Anonymous => {
                let name = self.resolve_login(tree, hostname)?;
                tree.set(&host.child(USER_KEY), name.as_str()).map_err(|e| {
                    RefusalError::new(format!("couldn't record user name for {hostname:?}: {e}"))
                })?;
                info!("resolved anonymous user on {} to {}", hostname, name);
                name
            }
        };

        let user = ConfigPath::user(hostname, &username);
        // The section must exist even when there is nothing to copy into it.
        tree.ensure_map(&user).map_err(|e| {
            RefusalError::new(format!("couldn't create user entry for {hostname:?}: {e}"))
        })?;

        for (key, value) in fields {
            tree.set(&user.child(key.as_str()), value).map_err(|e| {
                RefusalError::new(format!(
                    "couldn't copy {key:?} for {hostname:?} to user {username:?}: {e}"
                ))
            })?;
        }

        debug!("migrated {} for user {}", hostname, username);
        Ok(())
    }

    fn resolve_login(&self, tree: &ConfigTree, hostname: &str) -> Result<String, RefusalError> {
        let token = self.token_for(tree, hostname).ok_or_else(|| {
            RefusalError::new(format!("couldn't find oauth token for {hostname:?}"))
        })?;

        let login = self.resolver.resolve(hostname, &token).map_err(|e| {
            warn!("username lookup for {} failed: {:#}", hostname, e);
            RefusalError::new(format!("couldn't retrieve logged in user for {hostname:?}"))
        })?;

        if login.is_empty() {
            return Err(RefusalError::new(format!(
                "couldn't retrieve logged in user for {hostname:?}"
            )));
        }
        Ok(login)
    }

    /// The plaintext token if present, else the credential store's.
    fn token_for(&self, tree: &ConfigTree, hostname: &str) -> Option<String> {
        let plaintext = tree
            .lookup(&ConfigPath::host(hostname).child(OAUTH_TOKEN_KEY))
            .ok()
            .flatten()
            .filter(|token| !token.is_empty());
        if let Some(token) = plaintext {
            return Some(token.to_string());
        }

        match self.credentials.get(&keyring_service_name(hostname), "") {
            Ok(token) if !token.is_empty() => Some(token),
            Ok(_) => None,
            Err(CredentialError::NotFound { .. }) => {
                debug!("no stored token for {}", hostname);
                None
            }
            Err(e) => {
                warn!("credential store lookup for {} failed: {}", hostname, e);
                None
            }
        }
    }
}

/// Returns the host's scalar fields other than `user`, refusing on anything
/// that cannot be copied one level down.
fn collect_fields(
    tree: &ConfigTree,
    hostname: &str,
    keys: &[String],
) -> Result<Vec<(String, String)>, RefusalError> {
    let host = ConfigPath::host(hostname);
    let mut fields = Vec::with_capacity(keys.len());

    for key in keys.iter().filter(|key| *key != USER_KEY) {
        let node = tree.node(&host.child(key.as_str())).map_err(|_| {
            RefusalError::new(format!(
                "couldn't get configuration entry value despite {hostname:?} / {key:?} existing"
            ))
        })?;

        match node {
            Node::Map(_) if node.has_children() => {
                return Err(RefusalError::new(format!(
                    "hosts file has entries that are surprisingly deeply nested ({hostname:?} / {key:?})"
                )));
            }
            Node::Map(_) => {
                return Err(RefusalError::new(format!(
                    "couldn't get configuration entry value despite {hostname:?} / {key:?} existing"
                )));
            }
            Node::Leaf(_) if key == USERS_KEY => {
                return Err(RefusalError::new(format!(
                    "{hostname:?} has a {USERS_KEY:?} value that would be overwritten"
                )));
            }
            Node::Leaf(value) => fields.push((key.clone(), value.clone())),
        }
    }

    Ok(fields)
}

impl Migration for MultiAccount {
    fn name(&self) -> &str {
        "multi-account"
    }

    fn pre_version(&self) -> &str {
        ""
    }

    fn post_version(&self) -> &str {
        "1"
    }

    fn apply(&self, tree: &mut ConfigTree) -> Result<(), RefusalError> {
        let hostnames = match tree.keys(&ConfigPath::hosts()) {
            Ok(hostnames) => hostnames,
            // Nobody has logged in yet.
            Err(e) if e.is_not_found() => {
                debug!("no hosts section, nothing to migrate");
                return Ok(());
            }
            Err(_) => return Err(RefusalError::new("couldn't get hosts configuration")),
        };

        if hostnames.is_empty() {
            debug!("no hosts configured, nothing to migrate");
            return Ok(());
        }

        for hostname in &hostnames {
            self.migrate_host(tree, hostname)?;
        }

        info!("migrated {} host(s) to multi-account layout", hostnames.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::Migrator;
    use crate::resolver::StaticResolver;
    use multiauth_core::MemoryCredentialStore;
    use pretty_assertions::assert_eq;

    fn migration(resolver: StaticResolver, credentials: MemoryCredentialStore) -> MultiAccount {
        MultiAccount::new(Box::new(resolver), Box::new(credentials))
    }

    fn plain() -> MultiAccount {
        migration(StaticResolver::new(), MemoryCredentialStore::new())
    }

    fn host(tree: &mut ConfigTree, hostname: &str, fields: &[(&str, &str)]) {
        for (key, value) in fields {
            tree.set(&ConfigPath::host(hostname).child(*key), *value)
                .expect("fixture field should set");
        }
    }

    /// A credential store whose backend is unavailable.
    #[derive(Debug)]
    struct LockedStore;

    impl CredentialStore for LockedStore {
        fn get(&self, _service: &str, _account: &str) -> Result<String, CredentialError> {
            Err(CredentialError::Backend("keychain is locked".to_string()))
        }
    }

    fn get<'a>(tree: &'a ConfigTree, segments: &[&str]) -> Option<&'a str> {
        tree.lookup(&ConfigPath::from_segments(segments.iter().copied()))
            .expect("fixture lookup should not hit a section")
    }

    #[test]
    fn absent_or_empty_hosts_is_a_noop() {
        let mut tree = ConfigTree::new();
        plain().apply(&mut tree).expect("absent hosts should pass");
        assert_eq!(tree, ConfigTree::new());

        tree.ensure_map(&ConfigPath::hosts()).unwrap();
        let before = tree.clone();
        plain().apply(&mut tree).expect("empty hosts should pass");
        assert_eq!(tree, before);
    }

    #[test]
    fn scalar_hosts_is_refused() {
        let mut tree = ConfigTree::new();
        tree.set(&ConfigPath::hosts(), "github.com").unwrap();
        let err = plain().apply(&mut tree).unwrap_err();
        assert_eq!(err.reason, "couldn't get hosts configuration");
    }

    #[test]
    fn copies_fields_under_user_and_keeps_originals() {
        let mut tree = ConfigTree::new();
        host(
            &mut tree,
            "github.com",
            &[("user", "alice"), ("git_protocol", "https"), ("editor", "vim")],
        );

        plain().apply(&mut tree).expect("migration should pass");

        assert_eq!(get(&tree, &["hosts", "github.com", "user"]), Some("alice"));
        assert_eq!(
            get(&tree, &["hosts", "github.com", "git_protocol"]),
            Some("https")
        );
        assert_eq!(get(&tree, &["hosts", "github.com", "editor"]), Some("vim"));
        assert_eq!(
            tree.keys(&ConfigPath::user("github.com", "alice")).unwrap(),
            vec!["git_protocol", "editor"]
        );
        assert_eq!(
            get(&tree, &["hosts", "github.com", "users", "alice", "editor"]),
            Some("vim")
        );
    }

    #[test]
    fn user_entry_exists_even_without_other_fields() {
        let mut tree = ConfigTree::new();
        host(&mut tree, "github.com", &[("user", "monalisa")]);

        plain().apply(&mut tree).unwrap();

        assert!(tree
            .keys(&ConfigPath::user("github.com", "monalisa"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn anonymous_user_is_resolved_from_plaintext_token() {
        let mut tree = ConfigTree::new();
        host(
            &mut tree,
            "github.com",
            &[("user", "x-access-token"), ("oauth_token", "T")],
        );

        migration(
            StaticResolver::new().with("T", "bob"),
            MemoryCredentialStore::new(),
        )
        .apply(&mut tree)
        .expect("anonymous user should resolve");

        assert_eq!(get(&tree, &["hosts", "github.com", "user"]), Some("bob"));
        assert_eq!(
            get(&tree, &["hosts", "github.com", "users", "bob", "oauth_token"]),
            Some("T")
        );
    }

    #[test]
    fn anonymous_user_falls_back_to_credential_store() {
        let mut tree = ConfigTree::new();
        host(
            &mut tree,
            "ghe.io",
            &[("user", "x-access-token"), ("oauth_token", ""), ("git_protocol", "ssh")],
        );

        migration(
            StaticResolver::new().with("stored", "carol"),
            MemoryCredentialStore::new().with("gh:ghe.io", "", "stored"),
        )
        .apply(&mut tree)
        .expect("stored token should resolve");

        assert_eq!(get(&tree, &["hosts", "ghe.io", "user"]), Some("carol"));
        assert_eq!(
            get(&tree, &["hosts", "ghe.io", "users", "carol", "git_protocol"]),
            Some("ssh")
        );
    }

    #[test]
    fn anonymous_user_without_token_is_refused() {
        let mut tree = ConfigTree::new();
        host(&mut tree, "github.com", &[("user", "x-access-token")]);
        let before = tree.clone();

        let err = plain().apply(&mut tree).unwrap_err();

        assert_eq!(
            err.reason,
            "couldn't find oauth token for \"github.com\""
        );
        assert_eq!(tree, before);
    }

    #[test]
    fn resolver_failure_is_refused_and_keeps_sentinel() {
        let mut tree = ConfigTree::new();
        host(
            &mut tree,
            "github.com",
            &[("user", "x-access-token"), ("oauth_token", "unknown")],
        );

        let err = plain().apply(&mut tree).unwrap_err();

        assert_eq!(
            err.reason,
            "couldn't retrieve logged in user for \"github.com\""
        );
        assert_eq!(
            get(&tree, &["hosts", "github.com", "user"]),
            Some("x-access-token")
        );
    }

    #[test]
    fn deep_nesting_is_refused_and_later_hosts_untouched() {
        let mut tree = ConfigTree::new();
        host(&mut tree, "github.com", &[("user", "monalisa")]);
        tree.set(
            &ConfigPath::host("github.com").child("editor").child("name"),
            "vim",
        )
        .unwrap();
        host(&mut tree, "ghe.io", &[("user", "monalisa-ghe")]);

        let err = plain().apply(&mut tree).unwrap_err();

        assert!(err.reason.contains("surprisingly deeply nested"));
        assert!(tree.node(&ConfigPath::users("github.com")).is_err());
        assert!(tree.node(&ConfigPath::users("ghe.io")).is_err());
        assert_eq!(
            get(&tree, &["hosts", "github.com", "editor", "name"]),
            Some("vim")
        );
    }

    #[test]
    fn missing_user_is_refused_naming_the_host() {
        let mut tree = ConfigTree::new();
        host(&mut tree, "ghe.io", &[("git_protocol", "https")]);

        let err = plain().apply(&mut tree).unwrap_err();

        assert_eq!(err.reason, "couldn't get user name for \"ghe.io\"");
        assert!(tree.node(&ConfigPath::users("ghe.io")).is_err());
    }

    #[test]
    fn earlier_hosts_keep_their_migration_when_a_later_one_refuses() {
        let mut tree = ConfigTree::new();
        host(&mut tree, "github.com", &[("user", "monalisa"), ("git_protocol", "https")]);
        host(&mut tree, "ghe.io", &[("git_protocol", "ssh")]);
        host(&mut tree, "example.org", &[("user", "hubot")]);

        let err = plain().apply(&mut tree).unwrap_err();

        assert!(err.reason.contains("ghe.io"));
        assert_eq!(
            get(&tree, &["hosts", "github.com", "users", "monalisa", "git_protocol"]),
            Some("https")
        );
        assert!(tree.node(&ConfigPath::users("ghe.io")).is_err());
        assert!(tree.node(&ConfigPath::users("example.org")).is_err());
    }

    #[test]
    fn already_migrated_host_is_refused_without_changes() {
        // Without a marker the migration sees its own output; it must stop
        // rather than copy the users section into itself.
        let mut tree = ConfigTree::new();
        host(&mut tree, "github.com", &[("user", "monalisa"), ("git_protocol", "https")]);
        plain().apply(&mut tree).unwrap();
        let migrated = tree.clone();

        let err = plain().apply(&mut tree).unwrap_err();

        assert!(err.reason.contains("surprisingly deeply nested"));
        assert_eq!(tree, migrated);
    }

    #[test]
    fn scalar_users_field_is_refused() {
        let mut tree = ConfigTree::new();
        host(&mut tree, "github.com", &[("user", "monalisa"), ("users", "legacy")]);

        let err = plain().apply(&mut tree).unwrap_err();

        assert!(err.reason.contains("would be overwritten"));
        assert_eq!(get(&tree, &["hosts", "github.com", "users"]), Some("legacy"));
    }

    #[test]
    fn runner_applies_multi_account_once() {
        let migrator = Migrator::new().with(Box::new(plain()));
        let mut tree = ConfigTree::new();
        host(&mut tree, "github.com", &[("user", "monalisa"), ("git_protocol", "https")]);

        let first = migrator.run(&mut tree, |_| Ok(())).expect("first run");
        assert_eq!(first.version, "1");
        assert_eq!(first.applied.len(), 1);
        let migrated = tree.clone();

        let second = migrator.run(&mut tree, |_| Ok(())).expect("second run");
        assert!(second.is_noop());
        assert_eq!(tree, migrated);
    }

    #[test]
    fn runner_on_absent_or_empty_hosts_only_advances_marker() {
        let migrator = Migrator::new().with(Box::new(plain()));

        let mut tree = ConfigTree::new();
        tree.set(&ConfigPath::from_segments(["git_protocol"]), "https")
            .unwrap();
        let report = migrator.run(&mut tree, |_| Ok(())).expect("absent hosts");
        assert_eq!(report.version, "1");
        assert_eq!(report.applied.len(), 1);
        assert!(tree.node(&ConfigPath::hosts()).is_err());
        assert_eq!(get(&tree, &["version"]), Some("1"));
        assert_eq!(get(&tree, &["git_protocol"]), Some("https"));

        let mut tree = ConfigTree::new();
        tree.ensure_map(&ConfigPath::hosts()).unwrap();
        let mut saved = Vec::new();
        let report = migrator
            .run(&mut tree, |tree| {
                saved.push(tree.clone());
                Ok(())
            })
            .expect("empty hosts");
        assert_eq!(report.version, "1");
        assert!(tree.keys(&ConfigPath::hosts()).unwrap().is_empty());
        assert_eq!(saved.len(), 1);
        assert_eq!(get(&saved[0], &["version"]), Some("1"));
    }

    #[test]
    fn credential_backend_failure_is_a_missing_token_refusal() {
        let mut tree = ConfigTree::new();
        host(&mut tree, "ghe.io", &[("user", "x-access-token")]);
        let before = tree.clone();

        let err = MultiAccount::new(
            Box::new(StaticResolver::new().with("stored", "carol")),
            Box::new(LockedStore),
        )
        .apply(&mut tree)
        .unwrap_err();

        assert_eq!(err.reason, "couldn't find oauth token for \"ghe.io\"");
        assert_eq!(tree, before);
    }

    #[test]
    fn anonymous_hosts_only_use_their_own_stored_token() {
        let mut tree = ConfigTree::new();
        host(&mut tree, "a.example.com", &[("user", "x-access-token")]);
        host(&mut tree, "b.example.com", &[("user", "x-access-token")]);
        let resolver = StaticResolver::new()
            .with("gho_alice", "alice")
            .with("gho_bob", "bob");

        let mut shared = tree.clone();
        let err = migration(
            resolver.clone(),
            MemoryCredentialStore::new().with("gh:a.example.com", "", "gho_alice"),
        )
        .apply(&mut shared)
        .unwrap_err();
        assert_eq!(err.reason, "couldn't find oauth token for \"b.example.com\"");
        assert_eq!(get(&shared, &["hosts", "a.example.com", "user"]), Some("alice"));
        assert_eq!(
            get(&shared, &["hosts", "b.example.com", "user"]),
            Some("x-access-token")
        );

        migration(
            resolver,
            MemoryCredentialStore::new()
                .with("gh:a.example.com", "", "gho_alice")
                .with("gh:b.example.com", "", "gho_bob"),
        )
        .apply(&mut tree)
        .expect("each host has its own token");
        assert_eq!(get(&tree, &["hosts", "a.example.com", "user"]), Some("alice"));
        assert_eq!(get(&tree, &["hosts", "b.example.com", "user"]), Some("bob"));
    }
}
