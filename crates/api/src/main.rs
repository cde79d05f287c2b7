use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pinwatch_api::alerts::ThresholdEngine;
use pinwatch_api::config::ServerConfig;
use pinwatch_api::ingest::{self, IngestPipeline};
use pinwatch_api::notifications::NotificationDispatcher;
use pinwatch_api::router::{build_app_router, build_realtime_router};
use pinwatch_api::state::AppState;
use pinwatch_api::store::{PgTelemetryStore, TelemetryStore};
use pinwatch_api::ws;
use pinwatch_events::{PushConfig, PushGatewayClient, PushSender};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pinwatch_api=debug,tower_http=debug".into());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        realtime_port = config.realtime_port,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = pinwatch_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    pinwatch_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    pinwatch_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Real-time fan-out ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- Push gateway ---
    let push: Option<Arc<dyn PushSender>> = match PushConfig::from_env() {
        Some(push_config) => {
            let client = PushGatewayClient::new(push_config).expect("Failed to build push client");
            tracing::info!("Push delivery enabled");
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("PUSH_PROJECT_ID not set, push delivery disabled");
            None
        }
    };

    // --- Ingestion pipeline ---
    let store: Arc<dyn TelemetryStore> = Arc::new(PgTelemetryStore::new(pool.clone()));
    let dispatcher = NotificationDispatcher::new(Arc::clone(&store), push);
    let engine = ThresholdEngine::new(
        Arc::clone(&store),
        dispatcher,
        config.pipeline.equality_tolerance,
        config.pipeline.storage_retry,
    );
    let pipeline = IngestPipeline::new(
        store,
        Arc::clone(&ws_manager),
        engine,
        config.pipeline.storage_retry,
    );

    let shutdown = CancellationToken::new();
    let mqtt_handle = tokio::spawn(ingest::run_mqtt_subscriber(
        config.mqtt.clone(),
        pipeline,
        shutdown.clone(),
    ));

    // --- Routers ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
    };
    let app = build_app_router(state, &config);
    let realtime = build_realtime_router(Arc::clone(&ws_manager));

    let ip = config.host.parse().expect("Invalid HOST address");
    let api_addr = SocketAddr::new(ip, config.port);
    let realtime_addr = SocketAddr::new(ip, config.realtime_port);

    let api_listener = tokio::net::TcpListener::bind(api_addr)
        .await
        .expect("Failed to bind API address");
    let realtime_listener = tokio::net::TcpListener::bind(realtime_addr)
        .await
        .expect("Failed to bind real-time address");
    tracing::info!(%api_addr, %realtime_addr, "Starting servers");

    // Both listeners stop on the same signal.
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let api_server = axum::serve(api_listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let realtime_server = axum::serve(realtime_listener, realtime)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());

    // Open WebSocket connections keep the real-time server from draining, so
    // they are closed as soon as shutdown begins.
    let ws_closer = tokio::spawn({
        let shutdown = shutdown.clone();
        let ws_manager = Arc::clone(&ws_manager);
        async move {
            shutdown.cancelled().await;
            ws_manager.shutdown_all();
        }
    });

    let (api_result, realtime_result) = tokio::join!(api_server, realtime_server);
    if let Err(e) = api_result {
        tracing::error!(error = %e, "API server error");
    }
    if let Err(e) = realtime_result {
        tracing::error!(error = %e, "Real-time server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Servers stopped, cleaning up");

    shutdown.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(grace, mqtt_handle).await.is_err() {
        tracing::warn!("MQTT subscriber did not stop within the shutdown timeout");
    }
    let _ = ws_closer.await;

    heartbeat_handle.abort();
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
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
        _ = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
