mod config;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use candlefix::{
    CACHE_INVALIDATION_NOTICE, CancelHandle, RepairError, RepairReport, Repairer, cancel_pair,
};
use candlefix_middleware::RepositoryBuilder;
use candlefix_scylla::ScyllaRepository;

use config::{CliConfig, ReportFormat};

const EXIT_FATAL: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = match CliConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            eprintln!("candlefix: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match run(&cfg).await {
        Ok(report) => {
            if let Err(e) = print_report(&report, cfg.report) {
                eprintln!("candlefix: {e}");
                return ExitCode::from(EXIT_FATAL);
            }
            ExitCode::SUCCESS
        }
        Err(e @ RepairError::InvalidArg(_)) => {
            tracing::error!(error = %e, "invalid configuration");
            eprintln!("candlefix: {e}");
            ExitCode::from(EXIT_CONFIG)
        }
        Err(e) => {
            tracing::error!(error = %e, "repair aborted");
            eprintln!("candlefix: {e}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cfg: &CliConfig) -> Result<RepairReport, RepairError> {
    tracing::info!(
        hosts = ?cfg.store.hosts,
        dry_run = cfg.repair.dry_run,
        concurrency = cfg.repair.concurrency,
        "connecting to candle store"
    );
    let raw = ScyllaRepository::connect(&cfg.store).await?;
    let repo = RepositoryBuilder::new(std::sync::Arc::new(raw))
        .with_timeout(cfg.store.request_timeout)
        .with_retry(cfg.retry);
    tracing::debug!(stack = ?repo.to_stack(), "repository middleware");

    let repairer = Repairer::builder()
        .with_repository(repo.build())
        .config(cfg.repair.clone())
        .build()?;

    let (handle, token) = cancel_pair();
    tokio::spawn(cancel_on_ctrl_c(handle));
    repairer.run(&token).await
}

async fn cancel_on_ctrl_c(handle: CancelHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupt received; finishing in-flight partitions");
        handle.cancel();
    }
}

fn print_report(report: &RepairReport, format: ReportFormat) -> Result<(), serde_json::Error> {
    match format {
        ReportFormat::Text => println!("{report}"),
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
            eprintln!("NOTE: {CACHE_INVALIDATION_NOTICE}");
        }
    }
    Ok(())
}
