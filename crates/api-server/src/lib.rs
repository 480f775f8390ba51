//! C12: the synchronous HTTP surface over the two-stage reversal predictor,
//! the model registry, and the A/B framework. Four endpoint groups: predict
//! (preprocessed and raw-bar variants, single-version and multi-version
//! compare), model introspection/switching, experiment control, and health.
//!
//! Also guards against a PyO3 `multiprocessing` re-exec: when the
//! `embedded-ml` feature is active, the embedded interpreter's `spawn` start
//! method can re-launch this very binary as a worker process. That worker
//! must exit immediately rather than stand up a second HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use model_registry::ModelRegistry;
use preprocessing::Preprocessor;

use ab_testing::ABFramework;

pub mod auth;
pub mod brute_force;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ip_allowlist;
pub mod request_id;
pub mod routes;
pub mod security_headers;
pub mod state;

use crate::config::ReversalConfig;
use crate::state::AppState;

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(env_filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(ReversalConfig::from_env());
    tracing::info!(bind_addr = %config.bind_addr, models_root = %config.models_root.display(), "starting reversal predictor API");

    std::fs::create_dir_all(&config.models_root).ok();
    std::fs::create_dir_all(&config.experiments_root).ok();

    let registry = Arc::new(ModelRegistry::new(&config.models_root));
    match registry.auto_load_best_version(&config.models_root) {
        Some(version) => tracing::info!(version = %version, "active model version at startup"),
        None => tracing::warn!("no model version could be loaded at startup; predict endpoints will return 503"),
    }

    let preprocessor = Arc::new(Preprocessor::default());

    let ab_framework = Arc::new(
        ABFramework::load_from_disk(config.experiments_root.clone())
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to restore experiments from disk, starting empty");
                ABFramework::new(config.experiments_root.clone())
            }),
    );

    let state = AppState::new(registry, preprocessor, ab_framework.clone(), config.clone());
    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");

    let shutdown_ab_framework = ab_framework.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown_ab_framework.flush_all();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
