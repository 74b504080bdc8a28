//! Plain-text rendering of a [`StatusReport`].

use multiauth_gh::{AccountState, AccountStatus, Severity, StatusReport, TokenSource};

use crate::styles::{self as s, paint};

/// Renders the report the way `multiauth status` prints it.
///
/// `hosts_file` is shown as the token source for plaintext tokens.
pub fn render(report: &StatusReport, hosts_file: &str, color: bool) -> String {
    if report.is_empty() {
        return "You are not logged into any GitHub hosts. To log in, run: gh auth login\n"
            .to_string();
    }

    let mut lines = Vec::new();
    for (index, host) in report.hosts.iter().enumerate() {
        if index > 0 {
            lines.push(String::new());
        }
        lines.push(paint(s::HOST, &host.hostname, color));
        for (position, account) in host.accounts.iter().enumerate() {
            if position > 0 {
                lines.push(String::new());
            }
            lines.extend(account_lines(account, hosts_file, color));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn mark(severity: Severity, color: bool) -> String {
    match severity {
        Severity::Ok => paint(s::SUCCESS, "✓", color),
        Severity::Warning => paint(s::WARNING, "!", color),
        Severity::Error => paint(s::ERROR, "X", color),
    }
}

fn account_lines(account: &AccountStatus, hosts_file: &str, color: bool) -> Vec<String> {
    let host = &account.hostname;
    let source = match account.source {
        Some(TokenSource::HostsFile) => hosts_file,
        Some(TokenSource::CredentialStore) => "keyring",
        None => "no token",
    };
    let ok = mark(Severity::Ok, color);
    let fail = mark(Severity::Error, color);

    match &account.state {
        AccountState::Timeout => {
            return vec![format!("  {fail} {host}: timeout trying to connect to host")];
        }
        AccountState::AuthFailed => {
            return vec![
                format!("  {fail} {host}: authentication failed"),
                format!("  - The {host} token in {source} is invalid."),
                format!("  - To re-authenticate, run: gh auth login -h {host}"),
                format!("  - To forget about this host, run: gh auth logout -h {host}"),
            ];
        }
        AccountState::MissingScope(scope) => {
            return vec![
                format!("  {fail} {host}: the token in {source} is missing required scope '{scope}'"),
                format!("  - To request missing scopes, run: gh auth refresh -h {host}"),
            ];
        }
        AccountState::RequestFailed(message) => {
            return vec![format!("  {fail} {host}: {message}")];
        }
        AccountState::NoToken => {
            return vec![format!("  {fail} {host}: no token found for {}", account.login)];
        }
        AccountState::Ok { .. } | AccountState::NoScopes => {}
    }

    let mut lines = vec![format!(
        "  {ok} Logged in to {host} as {} ({source})",
        account.login
    )];
    if let Some(protocol) = &account.git_protocol {
        lines.push(format!(
            "  {ok} Git operations for {host} configured to use {protocol} protocol."
        ));
    }
    if let Some(token) = &account.token {
        lines.push(format!("  {ok} Token: {token}"));
    }
    match &account.state {
        AccountState::Ok {
            scopes: Some(scopes),
        } => lines.push(format!("  {ok} Token scopes: {scopes}")),
        AccountState::NoScopes => lines.push(format!(
            "  {} Token scopes: none",
            mark(Severity::Warning, color)
        )),
        _ => {}
    }
    lines
}
