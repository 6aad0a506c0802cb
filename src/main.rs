use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod routes;
mod services;

use config::Config;
use services::email::{EmailTransport, SmtpEmail};
use services::init;
use services::push::PushRegistry;
use services::sms::{GatewaySms, SmsTransport};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub push: Arc<PushRegistry>,
    pub sms: Arc<dyn SmsTransport>,
    pub email: Arc<dyn EmailTransport>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_notify=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Clinic Notification Service");

    // Initialize database
    let pool = init::init_db(&config).await?;

    let app_state = Arc::new(AppState {
        db: pool,
        push: Arc::new(PushRegistry::new()),
        sms: Arc::new(GatewaySms::new(config.sms.clone())),
        email: Arc::new(SmtpEmail::new(config.email.clone())),
        config: config.clone(),
    });

    // Create shutdown notifier for background workers
    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    // Spawn the delivery workers (returns JoinHandles so we can await shutdown)
    let worker_handles = init::spawn_delivery_workers(app_state.clone(), shutdown_tx.clone());

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))
        // Notification lifecycle routes
        .nest("/api/notifications", routes::notifications::router())
        // Live push channel
        .route("/ws", get(routes::ws::ws_handler))
        // Add shared state
        .with_state(app_state.clone())
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(
                    config
                        .server
                        .client_url
                        .parse::<HeaderValue>()
                        .map_err(|_| anyhow::anyhow!("Invalid CLIENT_URL for CORS"))?,
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                    axum::http::Method::PATCH,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    // Serve until a shutdown signal arrives, then notify workers and drop the
    // server future to stop accepting new connections.
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let shutdown_tx_clone = shutdown_tx.clone();
    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut term =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to bind SIGTERM");
            tokio::select! {
                _ = ctrl_c => {},
                _ = term.recv() => {},
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("Failed to bind Ctrl+C");
        }

        tracing::info!("Shutdown signal received, notifying delivery workers");
        let _ = shutdown_tx_clone.send(());
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {}
    }

    // Give delivery workers some time to finish in-flight jobs. Anything left
    // leased is re-exposed by lease expiry on the next start.
    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for delivery workers to exit",
        shutdown_wait.as_secs()
    );
    let workers_fut = async {
        for h in worker_handles {
            let _ = h.await;
        }
    };
    let _ = tokio::time::timeout(shutdown_wait, workers_fut).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
