use order_hub::api;
use order_hub::config::Config;
use order_hub::logger::init_logger;
use order_hub::state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = init_logger(&config.log_filter, config.log_json, config.log_dir.as_deref());

    tracing::info!(
        "Starting order-hub v{} (env: {})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );
    if config.is_development() {
        tracing::warn!("Running in development mode, JWT_SECRET may be a placeholder");
    }

    let state = AppState::new(&config).await?;
    let app = api::create_router(state.clone());

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("order-hub HTTP listening on {http_addr}");

    let router = state.router.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
                return;
            }
            tracing::info!("Shutdown signal received, closing live sessions");
            router.shutdown();
        })
        .await?;

    tracing::info!("order-hub stopped");
    Ok(())
}
