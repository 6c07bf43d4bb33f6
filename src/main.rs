use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::get,
    Router,
};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod allocator;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod service;

use db::LinkStore;
use service::LinkService;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub service: LinkService,
}

// ── Router ─────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Liveness probe, kept under /api so it cannot shadow a short code
        .route("/api/health", get(|| async { StatusCode::OK }))
        .route(
            "/api/links",
            get(handlers::links::list_links).post(handlers::links::create_link),
        )
        .route(
            "/api/links/:code",
            get(handlers::links::get_link).delete(handlers::links::delete_link),
        )
        // Short-link redirect
        .route("/:code", get(handlers::redirect::redirect))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent — env vars may already be set)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkdash=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::AppConfig::from_env()?;
    tracing::info!("Starting linkdash on {}", config.bind_addr());
    tracing::info!("Base URL: {}", config.base_url);

    let store = LinkStore::connect(&config.database_url, config.db_max_connections).await?;
    store.migrate().await?;
    tracing::info!("Database migrations applied");

    let state = Arc::new(AppState {
        service: LinkService::new(store.clone(), config.base_url.clone())
            .with_click_limit(config.max_pending_clicks),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let background click counts land before the pool goes away.
    state.service.drain_clicks().await;
    store.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    tracing::info!("Shutdown signal received");
}
