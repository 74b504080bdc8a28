//! Versioned migrations over the multiauth config tree.
//!
//! A [`Migrator`] applies registered [`Migration`]s in order against the
//! version marker stored in the tree. [`MultiAccount`] is the migration that
//! moves each host's settings under a per-account `users` namespace.

pub mod error;
pub mod login;
pub mod migration;
pub mod multi_account;
pub mod resolver;

pub use error::RefusalError;
pub use login::Login;
pub use migration::{AppliedMigration, Migration, Migrator, RunReport};
pub use multi_account::MultiAccount;
pub use resolver::{StaticResolver, UsernameResolver};
