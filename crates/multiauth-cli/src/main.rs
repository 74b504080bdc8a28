use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use multiauth_core::{resolve_config_dir, ConfigFiles, KeyringCredentialStore};
use multiauth_gh::{HttpScopeChecker, StatusOptions, StatusReport, UreqTransport, ViewerResolver};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod migrate;
mod report;
mod styles;

use styles as s;

/// The command-line interface for multiauth.
#[derive(Debug, Parser)]
#[command(name = "multiauth")]
#[command(version)]
#[command(styles = s::get_clap_styles())]
#[command(
    help_template = "{bin} {version}\n\n{about-with-newline}{usage-heading} {usage}\n\n{all-args}{after-help}"
)]
#[command(about = "Migrate and inspect multi-account GitHub CLI authentication")]
#[command(
    after_help = "\x1b[1;32mExamples:\x1b[0m\n  \x1b[36mmultiauth migrate --dry-run\x1b[0m       \x1b[2m# Show pending config migrations\x1b[0m\n  \x1b[36mmultiauth migrate\x1b[0m                 \x1b[2m# Move host settings under per-account users\x1b[0m\n  \x1b[36mmultiauth status --hostname ghe.io\x1b[0m  \x1b[2m# Check the accounts on one host\x1b[0m"
)]
pub(crate) struct Cli {
    /// Config directory holding config.yml and hosts.yml.
    /// Defaults to $GH_CONFIG_DIR, then $XDG_CONFIG_HOME/gh, then ~/.config/gh.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Timeout in seconds for GitHub API requests.
    #[arg(long, global = true, default_value_t = 10)]
    timeout: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending config migrations.
    Migrate {
        /// List what would be applied without writing anything.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Show authentication status for every configured account.
    Status {
        /// Only check a specific hostname.
        #[arg(long)]
        hostname: Option<String>,
        /// Display the auth token instead of masking it.
        #[arg(short = 't', long, default_value_t = false)]
        show_token: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    debug!("parsed cli arguments: {:?}", cli);

    match execute(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", s::paint(s::ERROR, &format!("{err:#}"), std::io::stderr().is_terminal()));
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<ExitCode> {
    let dir = resolve_config_dir(cli.config_dir.as_deref())?;
    let files = ConfigFiles::new(dir);
    let transport = UreqTransport::new(Duration::from_secs(cli.timeout));

    match &cli.command {
        Command::Migrate { dry_run } => {
            let migrator = migrate::migrator(
                Box::new(ViewerResolver::new(transport)),
                Box::new(KeyringCredentialStore::new()),
            );
            println!("{}", migrate::run(&migrator, &files, *dry_run)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Status {
            hostname,
            show_token,
        } => {
            let tree = files
                .load()
                .with_context(|| format!("unable to load config from '{}'", files.dir().display()))?;
            let options = StatusOptions {
                hostname: hostname.clone(),
                show_token: *show_token,
            };
            let status = StatusReport::gather(
                &tree,
                &options,
                &KeyringCredentialStore::new(),
                &HttpScopeChecker::new(transport),
            )?;

            let hosts_file = files.hosts_path().display().to_string();
            print!(
                "{}",
                report::render(&status, &hosts_file, std::io::stdout().is_terminal())
            );
            Ok(if status.has_errors() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}
