//! gq-update-quotas
//!
//! Syncs the scheduler group-quota file with the authoritative database.
//!
//! Exit status:
//! - 0: nothing changed, or the change was published (mail failures included)
//! - 1: any fatal error, or the scheduler reconfigure failed after publishing

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use gq_config::{LoggingConfig, MissingLiveFile, QuotaSyncConfig, DEFAULT_CONFIG_PATH};
use gq_db::PgGroupSource;
use gq_file::{MissingFile, Publisher};
use gq_reconcile::{CommandReconfigurer, Notification, Reconciler, SendmailNotifier};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gq-update-quotas")]
#[command(about = "Publish group quotas from the database to the scheduler config", long_about = None)]
struct Cli {
    /// Mail the change report to this address when the file changes
    #[arg(short = 'm', long = "mail", value_name = "ADDRESS")]
    mail: Option<String>,

    /// Run the scheduler reconfigure command when the file changes
    #[arg(short = 'r', long = "reconfig", default_value_t = false)]
    reconfig: bool,

    /// Layered config paths in merge order
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config_paths: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // dev-time .env.local bootstrap; absent file is fine
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{e:#}"), "update aborted");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let loaded = gq_config::load_layered_yaml(cli.config_paths.as_slice())?;
    let cfg = loaded.typed()?;

    init_tracing(&cfg.logging)?;
    info!(
        config_hash = %loaded.config_hash,
        paths = ?cli.config_paths,
        "configuration loaded"
    );

    let resolved = gq_config::resolve_source(&cfg.source)?;
    let source = PgGroupSource::connect(&resolved, &cfg.source).await?;

    let reconciler = build_reconciler(&cli, &cfg, source);
    let outcome = reconciler.reconcile().await?;

    if outcome.is_degraded() {
        warn!(exit_code = outcome.exit_code(), "published with downstream failures");
    }
    Ok(outcome.exit_code())
}

fn build_reconciler(cli: &Cli, cfg: &QuotaSyncConfig, source: PgGroupSource) -> Reconciler {
    let publisher = Publisher::new(&cfg.publish.live_path, cfg.publish.backup_path());
    let missing = match cfg.publish.missing_live_file {
        MissingLiveFile::Empty => MissingFile::Empty,
        MissingLiveFile::Fail => MissingFile::Fail,
    };

    let mut reconciler = Reconciler::new(Box::new(source), publisher).missing_live_file(missing);

    if cli.reconfig {
        let r = &cfg.reconfig;
        reconciler = reconciler.reconfigure_with(Box::new(
            CommandReconfigurer::new(&r.command, Duration::from_secs(r.timeout_secs))
                .with_args(r.args.iter().cloned())
                .with_env(r.env.clone()),
        ));
    }

    if let Some(recipient) = &cli.mail {
        let m = &cfg.mail;
        reconciler = reconciler.notify(Notification {
            notifier: Box::new(SendmailNotifier::new(
                &m.sender,
                &m.sendmail_command,
                m.sendmail_args.clone(),
                Duration::from_secs(m.timeout_secs),
            )),
            recipient: recipient.clone(),
            subject: m.subject.clone(),
            host_label: m.host_label(),
        });
    }

    reconciler
}

/// `RUST_LOG` wins over `logging.level`. With `logging.file` set, events are
/// appended there without colour codes.
fn init_tracing(cfg: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(&cfg.level).with_context(|| {
            format!("CONFIG_INVALID: logging.level '{}' is not a valid filter", cfg.level)
        })?,
    };

    let installed = match &cfg.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file: {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_parse_with_short_forms() {
        let cli = Cli::try_parse_from(["gq-update-quotas", "-m", "ops@example.org", "-r"]).unwrap();
        assert_eq!(cli.mail.as_deref(), Some("ops@example.org"));
        assert!(cli.reconfig);
        assert_eq!(cli.config_paths, vec![PathBuf::from(DEFAULT_CONFIG_PATH)]);
    }

    #[test]
    fn config_repeats_in_merge_order() {
        let cli = Cli::try_parse_from([
            "gq-update-quotas",
            "--config",
            "base.yaml",
            "--config",
            "site.yaml",
        ])
        .unwrap();
        assert_eq!(
            cli.config_paths,
            vec![PathBuf::from("base.yaml"), PathBuf::from("site.yaml")]
        );
        assert!(cli.mail.is_none());
        assert!(!cli.reconfig);
    }

    #[test]
    fn positional_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["gq-update-quotas", "extra"]).is_err());
    }
}
