//! Constants used across the multiauth workspace.

/// Root key holding one entry per authenticated host.
pub const HOSTS_KEY: &str = "hosts";

/// Root key recording the last applied migration version.
pub const VERSION_KEY: &str = "version";

/// Per-host key holding the per-account namespace.
pub const USERS_KEY: &str = "users";

/// Per-host key naming the active account.
pub const USER_KEY: &str = "user";

pub const OAUTH_TOKEN_KEY: &str = "oauth_token";
pub const GIT_PROTOCOL_KEY: &str = "git_protocol";

/// Placeholder login written for tokens whose owner was never looked up.
pub const ANONYMOUS_LOGIN: &str = "x-access-token";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "GH_CONFIG_DIR";

/// The file holding everything except the hosts subtree.
pub const CONFIG_FILE: &str = "config.yml";

/// The file holding the hosts subtree.
pub const HOSTS_FILE: &str = "hosts.yml";

/// Prefix of the credential store service name for a host.
pub const KEYRING_SERVICE_PREFIX: &str = "gh:";

pub const GITHUB_HOST: &str = "github.com";
