//! API endpoint resolution per host flavour.

use multiauth_core::constants::GITHUB_HOST;

const LOCALHOST: &str = "github.localhost";
const TENANCY_SUFFIX: &str = ".ghe.com";

fn normalize(hostname: &str) -> String {
    hostname.trim().to_ascii_lowercase()
}

/// True for GitHub Enterprise Server hosts, which serve the API under `/api`.
pub fn is_enterprise(hostname: &str) -> bool {
    let host = normalize(hostname);
    host != GITHUB_HOST && host != LOCALHOST && !host.ends_with(TENANCY_SUFFIX)
}

/// Root of the REST API, with a trailing slash.
pub fn rest_root(hostname: &str) -> String {
    let host = normalize(hostname);
    if host == LOCALHOST {
        format!("http://api.{host}/")
    } else if is_enterprise(&host) {
        format!("https://{host}/api/v3/")
    } else {
        format!("https://api.{host}/")
    }
}

pub fn graphql_url(hostname: &str) -> String {
    let host = normalize(hostname);
    if is_enterprise(&host) {
        format!("https://{host}/api/graphql")
    } else {
        format!("{}graphql", rest_root(&host))
    }
}
