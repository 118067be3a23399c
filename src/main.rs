use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod app_state;
mod audit;
mod bookings;
mod config;
mod db;
mod middleware;
mod roles;
mod utils;
mod workflow;

use crate::api::admin::AdminDoc;
use crate::api::auth::AuthDoc;
use crate::api::bookings::BookingDoc;
use crate::api::documents::DocumentDoc;
use crate::api::halls::HallDoc;
use crate::app_state::AppState;
use crate::config::{Config, StorageBackend};
use crate::db::memory::MemoryStore;
use crate::db::pool::{get_db_pool, run_migrations};
use crate::db::postgres::PgStore;
use crate::db::store::Stores;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stdout plus a daily-rolling file under `log_dir`. The guard must live as
/// long as the process or buffered file output is lost.
fn init_tracing(config: &Config) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "venue-booking.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    Ok(guard)
}

async fn open_stores(config: &Config) -> anyhow::Result<(Stores, Option<PgPool>)> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set")?;
            let pool = get_db_pool(url).await?;
            if config.run_migrations {
                run_migrations(&pool).await?;
            }
            let store = Arc::new(PgStore::new(pool.clone()));
            Ok((Stores::from_backend(store), Some(pool)))
        }
        StorageBackend::Memory => {
            info!("Using the in-memory store; data is lost on restart");
            Ok((Stores::from_backend(Arc::new(MemoryStore::new())), None))
        }
    }
}

/// Requests running past `limit` are answered with `408 Request Timeout`.
fn timeout_layer(limit: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, limit)
}

fn build_app(state: AppState) -> Router {
    let merged_doc = AuthDoc::openapi()
        .merge_from(HallDoc::openapi())
        .merge_from(BookingDoc::openapi())
        .merge_from(DocumentDoc::openapi())
        .merge_from(AdminDoc::openapi());

    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .merge(api::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(timeout_layer(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal(pool: Option<PgPool>) {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutdown signal received, draining connections");
    if let Some(pool) = pool {
        pool.close().await;
        info!("✅ Database pool closed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _log_guard = init_tracing(&config)?;

    let (stores, pool) = open_stores(&config).await?;
    let bind_addr = config.bind_addr;
    let bootstrap = config.bootstrap_admin.clone();
    let state = AppState::new(config, stores);
    info!("Documents stored under {}", state.documents.root().display());

    if let Some(admin) = bootstrap {
        match state
            .roles
            .bootstrap_super_admin(&admin.email, &admin.password, &admin.full_name)
            .await
            .context("Failed to bootstrap the super admin")?
        {
            Some(user) => info!(user_id = %user.id, "Super admin ready: {}", user.email),
            None => info!("A super admin already exists; bootstrap skipped"),
        }
    }

    let app = build_app(state);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("🚀 Server running on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(pool))
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}
