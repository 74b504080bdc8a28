use anyhow::Result;
use multiauth_core::constants::VERSION_KEY;
use multiauth_core::{ConfigPath, ConfigTree};
use tracing::{debug, info, instrument};

use crate::error::RefusalError;

/// A single versioned transformation of the config tree.
pub trait Migration: std::fmt::Debug {
    /// Short name used in logs and reports.
    fn name(&self) -> &str;
    /// The marker value this migration expects to find.
    fn pre_version(&self) -> &str;
    /// The marker value recorded once this migration succeeds.
    fn post_version(&self) -> &str;
    /// Mutates the tree in place.
    ///
    /// # Errors
    /// Any failure is a [`RefusalError`]; mutations made before the refusal
    /// are not rolled back.
    fn apply(&self, tree: &mut ConfigTree) -> Result<(), RefusalError>;
}

/// One migration applied during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub name: String,
    pub from: String,
    pub to: String,
}

/// What a [`Migrator::run`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub applied: Vec<AppliedMigration>,
    /// The marker value after the run.
    pub version: String,
}

impl RunReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies registered migrations against the tree's version marker.
#[derive(Debug, Default)]
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
}

impl Migrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a migration. Registration order is application order.
    pub fn register(&mut self, migration: Box<dyn Migration>) {
        self.migrations.push(migration);
    }

    pub fn with(mut self, migration: Box<dyn Migration>) -> Self {
        self.register(migration);
        self
    }

    fn marker_path() -> ConfigPath {
        ConfigPath::from_segments([VERSION_KEY])
    }

    /// Reads the version marker. A missing marker is the empty string.
    pub fn current_version(tree: &ConfigTree) -> Result<String, RefusalError> {
        tree.lookup(&Self::marker_path())
            .map(|version| version.unwrap_or_default().to_string())
            .map_err(|e| RefusalError::new(format!("couldn't read migration version: {e}")))
    }

    /// Lists the migrations a run would apply, without touching the tree.
    pub fn pending(&self, tree: &ConfigTree) -> Result<Vec<&dyn Migration>, RefusalError> {
        let mut version = Self::current_version(tree)?;
        let mut pending = Vec::new();
        for migration in &self.migrations {
            if migration.pre_version() == version {
                version = migration.post_version().to_string();
                pending.push(&**migration);
            }
        }
        Ok(pending)
    }

    /// Applies every migration whose pre-version matches the marker at the
    /// time it is reached, advancing the marker and calling `save` after
    /// each success.
    ///
    /// # Errors
    /// Stops at the first refusal. A failing `save` is reported as a refusal
    /// as well, and no later migration is attempted.
    #[instrument(skip(self, tree, save))]
    pub fn run<S>(&self, tree: &mut ConfigTree, mut save: S) -> Result<RunReport, RefusalError>
    where
        S: FnMut(&ConfigTree) -> Result<()>,
    {
        let mut report = RunReport {
            applied: Vec::new(),
            version: Self::current_version(tree)?,
        };
        debug!("current migration version: {:?}", report.version);

        for migration in &self.migrations {
            if migration.pre_version() != report.version {
                debug!(
                    "skip {}: expects version {:?}",
                    migration.name(),
                    migration.pre_version()
                );
                continue;
            }

            info!(
                "applying migration {} ({:?} -> {:?})",
                migration.name(),
                migration.pre_version(),
                migration.post_version()
            );
            migration.apply(tree)?;

            tree.set(&Self::marker_path(), migration.post_version())
                .map_err(|e| RefusalError::new(format!("couldn't record migration version: {e}")))?;
            save(&*tree).map_err(|e| {
                RefusalError::new(format!(
                    "failed to write config after migrating to version {:?}: {e:#}",
                    migration.post_version()
                ))
            })?;

            report.applied.push(AppliedMigration {
                name: migration.name().to_string(),
                from: migration.pre_version().to_string(),
                to: migration.post_version().to_string(),
            });
            report.version = migration.post_version().to_string();
        }

        Ok(report)
    }
}
