use thiserror::Error;

/// The only way a migration fails.
///
/// A refusal means no further unsafe change was made and a human needs to
/// inspect the config. It is never retried and never rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cowardly refusing to continue with multi account migration: {reason}")]
pub struct RefusalError {
    pub reason: String,
}

impl RefusalError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
