//! inspect-runner - CI driver for differential package inspections
//!
//! CLI entry point: runs one inspection step and maps the outcome to the
//! process exit code.

use clap::Parser;
use console::style;
use inspect_runner::cli::{Cli, LogFormat};
use inspect_runner::config::ConfigManager;
use inspect_runner::driver::{Backends, Driver};
use inspect_runner::error::{DriverError, DriverResult};
use inspect_runner::exit::CiStatus;
use inspect_runner::ui::{self, UiContext};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let step = tokio::spawn(run(cli));

    let result = tokio::select! {
        joined = step => joined.unwrap_or_else(|e| {
            Err(DriverError::Infrastructure(format!("inspection step aborted: {}", e)))
        }),
        signal = shutdown_signal() => Err(DriverError::Interrupted(signal.to_string())),
    };

    let status = match result {
        Ok(status) => status,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            e.ci_status()
        }
    };
    ExitCode::from(status)
}

/// Logging: 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` wins when set
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("inspect_runner=warn"),
        1 => EnvFilter::new("inspect_runner=info"),
        _ => EnvFilter::new("inspect_runner=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match cli.log_format {
        LogFormat::Text => builder.without_time().init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> DriverResult<CiStatus> {
    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    debug!("Loading configuration from {}", config_manager.path().display());
    let config = config_manager.load_merged(cli.profile.as_deref()).await?;

    let ctx = UiContext::detect();
    let backends = Backends::from_config(&config);
    let driver = Driver::new(config, cli.task_context(), backends).with_ui(ctx.clone());

    let execution = driver.execute(&cli.test_name).await?;

    ui::lineage_header(&ctx, &execution.lineage);
    ui::inspection(&ctx, &execution.outcome);
    Ok(execution.outcome.ci_status())
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        },
        _ => std::future::pending().await,
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "interrupt"
}
