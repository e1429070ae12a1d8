//! Invoice Harvester
//!
//! Entry point for the CLI and the HTTP API server.

mod bootstrap;
mod cli;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use harvester_api::{shutdown_signal, ApiConfig, ApiServer, AppState};
use harvester_config::ConfigLoader;
use harvester_jobs::JobStatus;
use harvester_otp::{decode_with_encoding, TotpGenerator};
use harvester_vendors::RunOptions;

use crate::bootstrap::App;
use crate::cli::{Cli, Commands, RunArgs};

/// Initialize tracing with console output and daily-rotated files in `log_dir`.
fn init_tracing(log_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("invoice-harvester")
        .filename_suffix("log")
        .max_log_files(30)
        .build(log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops the writer thread.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // No config, logging or browser needed.
    if let Some(Commands::Totp { secret }) = &cli.command {
        return print_totp(secret);
    }

    let config = ConfigLoader::load_or_default(&cli.config)?;
    init_tracing(&config.paths.resolve().logs_dir)?;
    info!(config = %cli.config.display(), "Invoice Harvester v{}", env!("CARGO_PKG_VERSION"));

    let app = bootstrap::build(config)?;

    match cli.command {
        None => run_server(app, None, None).await,
        Some(Commands::Serve { host, port }) => run_server(app, host, port).await,
        Some(Commands::Run { vendor, options }) => run_one(&app, &vendor, options).await,
        Some(Commands::RunAll { options }) => run_all(&app, options).await,
        Some(Commands::Vendors { format }) => list_vendors(&app, &format),
        Some(Commands::Status) => print_status(&app).await,
        Some(Commands::Totp { .. }) => Ok(()),
    }
}

async fn run_server(
    app: App,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::new(
        host.unwrap_or_else(|| app.config.server.host.clone()),
        port.unwrap_or(app.config.server.port),
    );
    info!(
        downloads = %app.paths.downloads_dir.display(),
        metadata = %app.paths.metadata_dir.display(),
        "Storage ready"
    );

    let state = Arc::new(AppState::new(app.orchestrator, app.ledger, app.artifacts));
    let server = ApiServer::new(config, state);
    if let Err(e) = server.run(shutdown_signal()).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }
    Ok(())
}

fn run_options(args: RunArgs) -> RunOptions {
    RunOptions {
        limit: args.limit,
        from_date: args.from_date,
    }
}

async fn run_one(
    app: &App,
    vendor: &str,
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let started = app.orchestrator.start_job(vendor, run_options(args));
    if started.is_ok() {
        app.orchestrator.wait_idle().await;
    }
    app.orchestrator.shutdown().await;
    started?;

    let record = app.orchestrator.status(vendor);
    println!("{}", serde_json::to_string_pretty(&record)?);
    match record.status {
        JobStatus::Failed => Err(format!(
            "{} failed: {}",
            vendor,
            record.error.as_deref().unwrap_or("unknown error")
        )
        .into()),
        _ => Ok(()),
    }
}

async fn run_all(app: &App, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let batch = app.orchestrator.start_all_jobs(run_options(args));
    app.orchestrator.wait_idle().await;
    app.orchestrator.shutdown().await;

    let records: Vec<_> = batch
        .vendors
        .iter()
        .map(|id| app.orchestrator.status(id))
        .collect();
    println!("{}", serde_json::to_string_pretty(&records)?);

    let failed = records
        .iter()
        .filter(|r| r.status == JobStatus::Failed)
        .count();
    if failed > 0 {
        return Err(format!("{} of {} vendors failed", failed, records.len()).into());
    }
    Ok(())
}

fn list_vendors(app: &App, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let descriptors = app.orchestrator.registry().descriptors();
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    println!("{:<16} {:<24} {:<6} LIST URL", "ID", "NAME", "LIMIT");
    for d in &descriptors {
        println!(
            "{:<16} {:<24} {:<6} {}",
            d.id, d.display_name, d.default_limit, d.invoice_list_url
        );
    }
    Ok(())
}

async fn print_status(app: &App) -> Result<(), Box<dyn std::error::Error>> {
    println!("{:<16} {:>8}  LAST DOWNLOAD", "VENDOR", "INVOICES");
    for id in app.orchestrator.registry().ids() {
        let records = app.ledger.list_by_vendor(&id).await?;
        let last = records
            .iter()
            .map(|r| r.downloaded_at)
            .max()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<16} {:>8}  {}", id, records.len(), last);
    }
    Ok(())
}

fn print_totp(secret: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (key, encoding) = decode_with_encoding(secret)?;
    let totp = TotpGenerator::default();
    let code = totp.now(&key)?;
    println!(
        "{} (expires in {}s, {:?} secret)",
        code,
        totp.seconds_remaining(Utc::now().timestamp()),
        encoding
    );
    Ok(())
}
