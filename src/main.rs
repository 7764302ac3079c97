use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod models;
mod scanner;
mod store;

use config::{AppConfig, StoreBackend};
use scanner::ScanOrchestrator;
use store::pocketbase::PocketBaseClient;
use store::sqlite::SqliteStore;
use store::MediaStore;

/// Tracks all background task handles for graceful shutdown
struct BackgroundTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    fn new() -> Self {
        Self {
            handles: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.handles.push((name, handle));
    }

    async fn shutdown(self) {
        tracing::info!("Initiating graceful shutdown...");

        self.shutdown.cancel();

        for (name, handle) in self.handles {
            tracing::debug!("Waiting for {} to finish...", name);
            match tokio::time::timeout(Duration::from_secs(10), handle).await {
                Ok(Ok(())) => tracing::debug!("{} finished cleanly", name),
                Ok(Err(e)) => tracing::warn!("{} panicked: {}", name, e),
                Err(_) => tracing::warn!("{} timed out during shutdown", name),
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

pub struct AppState {
    pub scanner: Arc<ScanOrchestrator>,
}

/// Connect to the configured store. The scanner needs superuser access, so a
/// failed PocketBase login is fatal.
async fn connect_store(config: &AppConfig) -> Result<Arc<dyn MediaStore>> {
    match config.store.backend {
        StoreBackend::PocketBase => {
            let url = config
                .store
                .pocketbase_url
                .as_deref()
                .context("POCKETBASE_URL must be set when using the pocketbase store")?;

            let client = PocketBaseClient::new(url, config.credentials());
            tracing::info!("Authenticating PocketBase superuser...");
            client
                .authenticate()
                .await
                .context("Could not authenticate PocketBase superuser")?;
            tracing::info!("PocketBase superuser authenticated successfully.");
            Ok(Arc::new(client))
        }
        StoreBackend::Sqlite => {
            tokio::fs::create_dir_all(&config.data_dir).await?;
            let store = SqliteStore::connect(&config.database_url()).await?;
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamflex_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load();
    config.log_config();

    let store = connect_store(&config).await?;
    let scanner = Arc::new(ScanOrchestrator::new(store, config.media_roots()));

    let mut bg_tasks = BackgroundTasks::new();
    let shutdown_token = bg_tasks.token();

    if config.scanner.scan_on_startup || config.scanner.interval_minutes > 0 {
        let periodic = Arc::clone(&scanner);
        let scan_on_startup = config.scanner.scan_on_startup;
        let interval_minutes = config.scanner.interval_minutes;
        let cancel = shutdown_token.clone();

        bg_tasks.spawn("periodic-scanner", async move {
            // Small delay to let the server fully start
            tokio::time::sleep(Duration::from_secs(2)).await;

            if scan_on_startup {
                tracing::info!("Running startup scan...");
                periodic.trigger();
            }

            if interval_minutes == 0 {
                return;
            }

            let interval = Duration::from_secs(interval_minutes * 60);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Scanner task received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        tracing::debug!("Periodic scan due");
                        periodic.trigger();
                    }
                }
            }
        });
    }

    let state = Arc::new(AppState { scanner });

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let ip = config
        .bind_address
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid bind address '{}'", config.bind_address))?;
    let addr = SocketAddr::new(ip, config.port);
    tracing::info!("Starting server on {}", addr);

    // Create shutdown signal listener
    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
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
            _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
            _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    bg_tasks.shutdown().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}
