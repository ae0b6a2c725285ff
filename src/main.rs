use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authn::cluster::{self, HttpClusterApi, ProxyClient, ReplicationQueue};
use authn::manager::UserManager;
use authn::storage::{FileStore, KvStore};
use authn::{api, config::Config, expiration, AppState};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "authn starting");

    let config = Config::load()?;
    info!(
        bind_address = %config.node.bind_address,
        primary_url = %config.cluster.primary_url,
        "Loaded configuration"
    );

    let storage: Arc<dyn KvStore> = Arc::new(FileStore::open(&config.node.data_dir)?);
    info!("Data directory: {}", config.node.data_dir);

    let (replication, jobs) = ReplicationQueue::channel();
    let manager = Arc::new(UserManager::open(
        Arc::clone(&storage),
        &config.tokens,
        replication.clone(),
    )?);

    let cluster_api =
        HttpClusterApi::new(Duration::from_millis(config.cluster.request_timeout_ms))?;
    let proxy = Arc::new(ProxyClient::new(Arc::new(cluster_api), storage));
    proxy.init(&config.cluster.primary_url).await;

    let state = Arc::new(AppState {
        config: config.clone(),
        manager: Arc::clone(&manager),
        proxy: Arc::clone(&proxy),
    });

    // Start background tasks
    let replication_handle =
        cluster::start_replication_worker(Arc::clone(&manager), Arc::clone(&proxy), jobs);
    let expiration_handle = expiration::start_expiration_cleaner(
        Arc::clone(&manager),
        Duration::from_secs(config.tokens.cleanup_interval_seconds),
    );

    // Make sure the primary has the restored token list
    replication.schedule();

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup: abort background tasks
    info!("Shutting down background tasks");
    replication_handle.abort();
    expiration_handle.abort();

    if let Err(e) = manager.save_tokens() {
        tracing::error!(error = %e, "Failed to save tokens during shutdown");
    }
    proxy.persist().await;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
