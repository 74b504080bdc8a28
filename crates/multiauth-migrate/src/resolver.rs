use std::collections::HashMap;

use anyhow::{anyhow, Result};

/// Looks up the login that owns a token on a host.
pub trait UsernameResolver: std::fmt::Debug {
    fn resolve(&self, hostname: &str, token: &str) -> Result<String>;
}

/// A resolver answering from a fixed token-to-login table.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    logins: HashMap<String, String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: impl Into<String>, login: impl Into<String>) -> Self {
        self.logins.insert(token.into(), login.into());
        self
    }
}

impl UsernameResolver for StaticResolver {
    fn resolve(&self, hostname: &str, token: &str) -> Result<String> {
        self.logins
            .get(token)
            .cloned()
            .ok_or_else(|| anyhow!("no login known for token on {hostname}"))
    }
}
