use std::fmt::{Display, Formatter};

use crate::constants::{HOSTS_KEY, USERS_KEY};

/// An address into a [`ConfigTree`](crate::ConfigTree).
///
/// Paths are kept as segments rather than dotted strings because hostnames
/// such as `github.com` contain dots themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    segments: Vec<String>,
}

impl ConfigPath {
    /// The root of the tree.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// `[hosts]`
    pub fn hosts() -> Self {
        Self::from_segments([HOSTS_KEY])
    }

    /// `[hosts, <hostname>]`
    pub fn host(hostname: &str) -> Self {
        Self::hosts().child(hostname)
    }

    /// `[hosts, <hostname>, users]`
    pub fn users(hostname: &str) -> Self {
        Self::host(hostname).child(USERS_KEY)
    }

    /// `[hosts, <hostname>, users, <username>]`
    pub fn user(hostname: &str, username: &str) -> Self {
        Self::users(hostname).child(username)
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Splits the path into its parent and final segment.
    pub fn split_last(&self) -> Option<(ConfigPath, &str)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            ConfigPath {
                segments: parent.to_vec(),
            },
            last.as_str(),
        ))
    }
}

impl Display for ConfigPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            if segment.contains('.') {
                write!(f, "{segment:?}")?;
            } else {
                write!(f, "{segment}")?;
            }
        }
        Ok(())
    }
}
