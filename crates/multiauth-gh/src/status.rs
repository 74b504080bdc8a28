//! Per-account authentication status across all configured hosts.
//!
//! The report is plain data. Rendering it for a terminal is the CLI's job.

use anyhow::{bail, Context, Result};
use multiauth_core::constants::{GIT_PROTOCOL_KEY, OAUTH_TOKEN_KEY, USER_KEY};
use multiauth_core::{keyring_service_name, ConfigPath, ConfigTree, CredentialError, CredentialStore};
use tracing::{debug, instrument, warn};

use crate::scopes::{missing_required_scope, ScopeChecker, ScopeError};

/// Token prefixes that never carry classic OAuth scopes.
const SCOPELESS_TOKEN_PREFIXES: &[&str] = &["ghs_", "github_pat_"];

#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    pub hostname: Option<String>,
    pub show_token: bool,
}

/// Where an account's token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    HostsFile,
    CredentialStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountState {
    /// Token accepted. `scopes` is `None` for tokens without classic scopes.
    Ok { scopes: Option<String> },
    NoScopes,
    Timeout,
    AuthFailed,
    MissingScope(String),
    RequestFailed(String),
    NoToken,
}

impl AccountState {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Ok { .. } => Severity::Ok,
            Self::NoScopes => Severity::Warning,
            Self::Timeout
            | Self::AuthFailed
            | Self::MissingScope(_)
            | Self::RequestFailed(_)
            | Self::NoToken => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountStatus {
    pub hostname: String,
    pub login: String,
    pub active: bool,
    pub source: Option<TokenSource>,
    pub git_protocol: Option<String>,
    /// Masked unless the report was gathered with `show_token`.
    pub token: Option<String>,
    pub state: AccountState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStatus {
    pub hostname: String,
    pub accounts: Vec<AccountStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub hosts: Vec<HostStatus>,
}

impl StatusReport {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.hosts
            .iter()
            .flat_map(|host| &host.accounts)
            .any(|account| account.state.severity() == Severity::Error)
    }

    /// Builds the report for every host in `tree`, or only
    /// `options.hostname` when set.
    #[instrument(skip_all, fields(hostname = ?options.hostname))]
    pub fn gather(
        tree: &ConfigTree,
        options: &StatusOptions,
        credentials: &dyn CredentialStore,
        scopes: &dyn ScopeChecker,
    ) -> Result<Self> {
        let mut hostnames = match tree.keys(&ConfigPath::hosts()) {
            Ok(keys) => keys,
            Err(err) if err.is_not_found() => Vec::new(),
            Err(err) => {
                return Err(anyhow::Error::new(err).context("couldn't read hosts configuration"))
            }
        };

        if let Some(wanted) = &options.hostname {
            if !hostnames.iter().any(|h| h == wanted) {
                bail!("Hostname \"{wanted}\" not found among authenticated GitHub hosts");
            }
            hostnames.retain(|h| h == wanted);
        }

        let mut hosts = Vec::with_capacity(hostnames.len());
        for hostname in hostnames {
            let accounts = host_accounts(tree, &hostname)?
                .into_iter()
                .map(|(login, active)| {
                    account_status(tree, &hostname, login, active, options, credentials, scopes)
                })
                .collect();
            hosts.push(HostStatus { hostname, accounts });
        }
        Ok(Self { hosts })
    }
}

/// Logins known on a host with the active one first.
fn host_accounts(tree: &ConfigTree, hostname: &str) -> Result<Vec<(String, bool)>> {
    let active = tree
        .lookup(&ConfigPath::host(hostname).child(USER_KEY))
        .with_context(|| format!("couldn't read active user for {hostname}"))?
        .filter(|login| !login.is_empty())
        .map(str::to_string);

    let mut users = match tree.keys(&ConfigPath::users(hostname)) {
        Ok(keys) => keys,
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err) => {
            return Err(anyhow::Error::new(err).context(format!("couldn't read users for {hostname}")))
        }
    };

    let mut accounts = Vec::with_capacity(users.len() + 1);
    if let Some(active) = active {
        users.retain(|user| *user != active);
        accounts.push((active, true));
    }
    accounts.extend(users.into_iter().map(|user| (user, false)));
    Ok(accounts)
}

fn account_status(
    tree: &ConfigTree,
    hostname: &str,
    login: String,
    active: bool,
    options: &StatusOptions,
    credentials: &dyn CredentialStore,
    scopes: &dyn ScopeChecker,
) -> AccountStatus {
    let user_path = ConfigPath::user(hostname, &login);
    let host_path = ConfigPath::host(hostname);

    let git_protocol = scalar(tree, &user_path.child(GIT_PROTOCOL_KEY))
        .or_else(|| scalar(tree, &host_path.child(GIT_PROTOCOL_KEY)));

    let found = find_token(tree, hostname, &login, active, credentials);
    let state = match &found {
        Some((token, _)) => classify(scopes.check(hostname, token), token),
        None => AccountState::NoToken,
    };
    debug!(%hostname, %login, ?state, "account checked");

    let (token, source) = match found {
        Some((token, source)) => {
            let shown = if options.show_token {
                token
            } else {
                mask_token(&token)
            };
            (Some(shown), Some(source))
        }
        None => (None, None),
    };

    AccountStatus {
        hostname: hostname.to_string(),
        login,
        active,
        source,
        git_protocol,
        token,
        state,
    }
}

fn scalar(tree: &ConfigTree, path: &ConfigPath) -> Option<String> {
    tree.lookup(path)
        .ok()
        .flatten()
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Token lookup order: the user's plaintext token, the host's plaintext
/// token (active user only), the credential store under the login, then the
/// credential store's host-wide entry (active user only).
fn find_token(
    tree: &ConfigTree,
    hostname: &str,
    login: &str,
    active: bool,
    credentials: &dyn CredentialStore,
) -> Option<(String, TokenSource)> {
    if let Some(token) = scalar(tree, &ConfigPath::user(hostname, login).child(OAUTH_TOKEN_KEY)) {
        return Some((token, TokenSource::HostsFile));
    }
    if active {
        if let Some(token) = scalar(tree, &ConfigPath::host(hostname).child(OAUTH_TOKEN_KEY)) {
            return Some((token, TokenSource::HostsFile));
        }
    }

    let service = keyring_service_name(hostname);
    let mut accounts = vec![login];
    if active {
        accounts.push("");
    }
    accounts.into_iter().find_map(|account| {
        match credentials.get(&service, account) {
            Ok(token) if !token.is_empty() => Some((token, TokenSource::CredentialStore)),
            Ok(_) | Err(CredentialError::NotFound { .. }) => None,
            Err(err) => {
                warn!(%service, %err, "credential store lookup failed");
                None
            }
        }
    })
}

fn classify(checked: Result<Option<String>, ScopeError>, token: &str) -> AccountState {
    let header = match checked {
        Ok(header) => header.unwrap_or_default(),
        Err(ScopeError::Timeout) => return AccountState::Timeout,
        Err(ScopeError::Status(_)) => return AccountState::AuthFailed,
        Err(ScopeError::Transport(message)) => return AccountState::RequestFailed(message),
    };

    let header = header.trim();
    if header.is_empty() {
        if SCOPELESS_TOKEN_PREFIXES
            .iter()
            .any(|prefix| token.starts_with(prefix))
        {
            return AccountState::Ok { scopes: None };
        }
        return AccountState::NoScopes;
    }

    match missing_required_scope(header) {
        Some(scope) => AccountState::MissingScope(scope.to_string()),
        None => AccountState::Ok {
            scopes: Some(header.to_string()),
        },
    }
}

/// Hides a token, keeping its type prefix (everything through the last `_`).
pub fn mask_token(token: &str) -> String {
    let keep = token.rfind('_').map_or(0, |index| index + 1);
    let (prefix, secret) = token.split_at(keep);
    format!("{prefix}{}", "*".repeat(secret.chars().count()))
}
