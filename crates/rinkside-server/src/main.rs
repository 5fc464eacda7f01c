// Rinkside draft server entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database
// 4. Build the draft service
// 5. Spawn WebSocket server task
// 6. Wait for Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use rinkside_core::config;
use rinkside_core::db::Database;
use rinkside_core::notify::Notifier;
use rinkside_core::service::DraftService;
use rinkside_server::ws_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Rinkside starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, {} rounds per draft, baseline tier {}",
        config.league.name, config.league.rounds_per_draft, config.league.baseline_tier
    );

    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    let service = Arc::new(DraftService::from_config(&config, db));
    match service.notifier() {
        Notifier::Webhook(_) => info!("Captain notifications enabled (webhook configured)"),
        Notifier::Disabled => info!("Captain notifications disabled (no webhook)"),
    }
    if !service.has_refresher() {
        info!("No ratings file configured, drafts use stored ratings");
    }

    let ws_port = config.ws_port;
    let ws_service = Arc::clone(&service);
    let ws_handle = tokio::spawn(async move {
        match ws_server::bind(ws_port).await {
            Ok(listener) => {
                if let Err(e) = ws_server::run(listener, ws_service).await {
                    error!("WebSocket server error: {:#}", e);
                }
            }
            Err(e) => error!("Failed to start WebSocket server: {:#}", e),
        }
    });

    info!("Ready on port {}", ws_port);
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    ws_handle.abort();
    info!("Rinkside shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to `logs/rinkside.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("rinkside.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rinkside=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
