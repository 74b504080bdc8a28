//! OAuth scope inspection via the `X-Oauth-Scopes` response header.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::host::rest_root;
use crate::transport::{Request, Transport, TransportError};

pub const SCOPES_HEADER: &str = "X-Oauth-Scopes";

const REPO_SCOPE: &str = "repo";
const ORG_SCOPES: &[&str] = &["read:org", "write:org", "admin:org"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("timeout trying to connect to host")]
    Timeout,

    #[error("HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Transport(String),
}

impl From<TransportError> for ScopeError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { .. } => Self::Timeout,
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Fetches the scopes granted to a token.
pub trait ScopeChecker: std::fmt::Debug {
    /// Returns the raw scopes header, or `None` if the host sent none.
    fn check(&self, hostname: &str, token: &str) -> Result<Option<String>, ScopeError>;
}

/// Asks the REST API root and reads the scopes header off the response.
#[derive(Debug)]
pub struct HttpScopeChecker<T: Transport> {
    transport: T,
}

impl<T: Transport> HttpScopeChecker<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: Transport> ScopeChecker for HttpScopeChecker<T> {
    #[instrument(skip(self, token))]
    fn check(&self, hostname: &str, token: &str) -> Result<Option<String>, ScopeError> {
        let request = Request::get(rest_root(hostname)).token(token);
        let response = self.transport.send(&request)?;
        if !response.is_success() {
            debug!(status = response.status, "scope check rejected");
            return Err(ScopeError::Status(response.status));
        }
        Ok(response.header(SCOPES_HEADER).map(str::to_string))
    }
}

/// Splits a scopes header into individual scope names.
pub fn parse_scopes(header: &str) -> Vec<&str> {
    header
        .split(',')
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .collect()
}

/// The first required scope missing from a non-empty scopes header.
pub fn missing_required_scope(header: &str) -> Option<&'static str> {
    let scopes = parse_scopes(header);
    if !scopes.contains(&REPO_SCOPE) {
        return Some(REPO_SCOPE);
    }
    if !scopes.iter().any(|scope| ORG_SCOPES.contains(scope)) {
        return Some(ORG_SCOPES[0]);
    }
    None
}
