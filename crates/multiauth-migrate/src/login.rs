use std::fmt::{Display, Formatter};

use multiauth_core::constants::ANONYMOUS_LOGIN;

/// The identity recorded in a host's `user` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Login {
    /// A real account login.
    Named(String),
    /// The placeholder written when a token's owner was never looked up.
    Anonymous,
}

impl Login {
    /// Decodes a stored `user` value. Returns `None` for an empty value.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "" => None,
            ANONYMOUS_LOGIN => Some(Self::Anonymous),
            name => Some(Self::Named(name.to_string())),
        }
    }

    pub fn as_named(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Anonymous => None,
        }
    }
}

impl Display for Login {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Anonymous => write!(f, "{ANONYMOUS_LOGIN}"),
        }
    }
}
