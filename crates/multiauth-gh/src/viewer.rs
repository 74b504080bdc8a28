use anyhow::{bail, Context, Result};
use multiauth_migrate::UsernameResolver;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::host::graphql_url;
use crate::transport::{Request, Transport};

const CURRENT_USER_QUERY: &str = "query CurrentUser{viewer{login}}";

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ViewerData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct ViewerData {
    viewer: Viewer,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// Resolves the login owning a token by asking the host's GraphQL API for the
/// current viewer.
#[derive(Debug)]
pub struct ViewerResolver<T: Transport> {
    transport: T,
}

impl<T: Transport> ViewerResolver<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: Transport> UsernameResolver for ViewerResolver<T> {
    #[instrument(skip(self, token))]
    fn resolve(&self, hostname: &str, token: &str) -> Result<String> {
        let url = graphql_url(hostname);
        let request = Request::post_json(&url, json!({ "query": CURRENT_USER_QUERY })).token(token);
        let response = self.transport.send(&request)?;

        if !response.is_success() {
            bail!(
                "HTTP {} from {url} while looking up the current user",
                response.status
            );
        }

        let parsed: GraphqlResponse = response
            .json()
            .with_context(|| format!("unexpected response from {url}"))?;
        if let Some(first) = parsed.errors.first() {
            bail!("GraphQL error from {url}: {}", first.message);
        }

        let login = parsed
            .data
            .map(|data| data.viewer.login)
            .unwrap_or_default();
        if login.is_empty() {
            bail!("{url} returned no login for the current viewer");
        }
        debug!(%login, "resolved current viewer");
        Ok(login)
    }
}
