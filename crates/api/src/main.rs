use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storyreel_api::config::ServerConfig;
use storyreel_api::router::build_app_router;
use storyreel_api::shutdown::drain_within;
use storyreel_api::state::AppState;
use storyreel_core::ids::UuidSource;
use storyreel_media::{FfmpegExtractor, MediaStore};
use storyreel_orchestrator::{JobOrchestrator, OrchestratorConfig};
use storyreel_provider::{ChatApiClient, ProviderConfig, VideoApiClient};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storyreel_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = storyreel_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    if !storyreel_db::health_check(&pool).await {
        panic!("Database health check failed");
    }
    tracing::info!("Database health check passed");

    storyreel_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Media store ---
    let media = MediaStore::new(config.media_root.clone());
    tracing::info!(root = %config.media_root, "Media store initialized");

    // --- Provider clients (shared reqwest pool) ---
    let provider_config = ProviderConfig::from_env();
    let http = reqwest::Client::new();
    let video_client = VideoApiClient::with_client(
        http.clone(),
        provider_config.api_base.clone(),
        provider_config.api_key.clone(),
    );
    let chat_client = ChatApiClient::with_client(
        http,
        provider_config.api_base.clone(),
        provider_config.api_key.clone(),
        provider_config.options_model.clone(),
    );
    tracing::info!(api_base = %provider_config.api_base, "Provider clients configured");

    // --- Orchestrator ---
    let orchestrator = Arc::new(JobOrchestrator::new(
        pool.clone(),
        media,
        Arc::new(video_client),
        Arc::new(chat_client),
        Arc::new(FfmpegExtractor),
        Arc::new(UuidSource),
        OrchestratorConfig::default(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        clip_defaults: provider_config.clip_defaults(),
        orchestrator,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal.cancel();
    });

    let drain = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { drain.cancelled().await });

    let drained = drain_within(
        async move { server.await },
        shutdown,
        Duration::from_secs(config.shutdown_timeout_secs),
    )
    .await
    .expect("Server error");

    if drained {
        tracing::info!("Graceful shutdown complete");
    } else {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Graceful shutdown timed out, dropping remaining connections"
        );
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server shuts
/// down cleanly whether stopped interactively or by a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
