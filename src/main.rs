use anyhow::{Context, Result};
use clap::Parser;
use coding_expert::cli::{Cli, Commands};
use coding_expert::server::{serve, shutdown_signal};
use coding_expert_core::runtime::languages_from_config;
use coding_expert_core::{ConfigManager, Runtime};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "coding_expert=info,coding_expert_core=info,tower_http=warn";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut manager = ConfigManager::load(cli.config.as_deref())?;
    cli.apply_overrides(manager.config_mut());
    if let Some(path) = manager.config_path() {
        info!(path = %path.display(), "loaded configuration file");
    }

    match cli.command() {
        Commands::Serve => run_server(manager).await,
        Commands::Languages => print_languages(manager).await,
        Commands::CheckConfig => check_config(&manager),
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_server(manager: ConfigManager) -> Result<()> {
    manager.validate()?;
    let config = manager.into_config();
    let addr = format!("{}:{}", config.server.bind, config.server.port);

    let runtime = Runtime::bootstrap(config)
        .await
        .context("failed to initialise the agent runtime")?;
    info!(?runtime, "runtime ready");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    serve(runtime, listener, shutdown_signal()).await?;
    info!("shutdown complete");
    Ok(())
}

async fn print_languages(manager: ConfigManager) -> Result<()> {
    let languages = languages_from_config(&manager.config().sandbox).await?;
    println!("{}", serde_json::to_string_pretty(&languages.list())?);
    Ok(())
}

/// Secrets are excluded from serialization, so the printed form is safe to share
fn check_config(manager: &ConfigManager) -> Result<()> {
    let rendered = serde_json::to_string_pretty(manager.config())?;
    println!("{rendered}");
    manager.validate()?;
    info!("configuration is valid");
    Ok(())
}
