use aurum::config::Config;
use aurum::{app, AppState};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aurum=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Starting Aurum server on {}:{}", config.host, config.port);
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState::new(config)?;

    // Start scheduled prediction runs
    let scheduler = state.scheduler.clone();
    let handles = if state.config.scheduler.enabled {
        scheduler.start()
    } else {
        info!("Scheduler disabled");
        Vec::new()
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Aurum server listening on {}", addr);

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    })
    .await?;

    scheduler.stop();
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
