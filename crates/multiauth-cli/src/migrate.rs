use anyhow::{Context, Result};
use multiauth_core::{ConfigFiles, ConfigTree, CredentialStore};
use multiauth_migrate::{Migrator, MultiAccount, RunReport, UsernameResolver};
use tracing::{info, instrument};

/// The migrations this binary knows about, in application order.
pub fn migrator(
    resolver: Box<dyn UsernameResolver>,
    credentials: Box<dyn CredentialStore>,
) -> Migrator {
    Migrator::new().with(Box::new(MultiAccount::new(resolver, credentials)))
}

/// Runs `migrator` against the config in `files`, persisting after each step.
///
/// With `dry_run`, only reports what would be applied.
#[instrument(skip(migrator, files), fields(dir = %files.dir().display()))]
pub fn run(migrator: &Migrator, files: &ConfigFiles, dry_run: bool) -> Result<String> {
    let mut tree: ConfigTree = files
        .load()
        .with_context(|| format!("unable to load config from '{}'", files.dir().display()))?;

    if dry_run {
        let pending = migrator.pending(&tree)?;
        if pending.is_empty() {
            return Ok("config is up to date".to_string());
        }
        let names: Vec<_> = pending.iter().map(|m| m.name()).collect();
        return Ok(format!("would apply: {}", names.join(", ")));
    }

    let report = migrator.run(&mut tree, |tree| Ok(files.save(tree)?))?;
    info!("config version is now {:?}", report.version);
    Ok(summary(&report))
}

fn summary(report: &RunReport) -> String {
    if report.is_noop() {
        return "config is up to date".to_string();
    }
    let steps: Vec<_> = report
        .applied
        .iter()
        .map(|applied| format!("{} ({:?} -> {:?})", applied.name, applied.from, applied.to))
        .collect();
    format!("migrated config: {}", steps.join(", "))
}
