mod aggregator;
mod api;
mod auth;
mod cache;
mod config;
mod db;
mod devices;
mod error;
mod mac;
mod radius;
mod ws;

use anyhow::Result;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::JwtService;
use crate::cache::{MemoryStatsCache, StatsCache};
use crate::config::Config;
use crate::radius::locks::MacLocks;
use crate::ws::LiveEvent;

// ─── App State ───────────────────────────────────────────────────────────────

pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub jwt: JwtService,
    pub stats_cache: Arc<dyn StatsCache>,
    pub mac_locks: Arc<MacLocks>,
    pub event_tx: broadcast::Sender<LiveEvent>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let (event_tx, _) = broadcast::channel::<LiveEvent>(256);
        AppState {
            pool,
            jwt: JwtService::new(&config.jwt_secret, config.jwt_expiry_secs),
            stats_cache: Arc::new(MemoryStatsCache::new()),
            mac_locks: Arc::new(MacLocks::new()),
            event_tx,
            config,
        }
    }
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "radius_admin=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("=== WIFI Admin Portal starting ===");

    let config = Config::from_env();

    // Database
    let pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database ready");

    auth::ensure_bootstrap_admin(&pool, config.bootstrap_admin.as_ref()).await?;
    tracing::info!("SSID match mode: {:?}", config.ssid_match_mode);

    let port = config.port;
    let state = Arc::new(AppState::new(pool, config));

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/api/health", get(api::health))
        .route("/api/auth/login", post(api::auth::login))
        // WebSocket (authenticates from the query string)
        .route("/ws", get(api::ws_handler::ws_handler));

    let protected = Router::new()
        // Portal admins
        .route("/api/users", get(api::users::list_users))
        .route("/api/users", post(api::users::create_user))
        .route("/api/users/:id", delete(api::users::delete_user))
        .route("/api/users/:id/password", put(api::users::change_password))
        // Devices
        .route("/api/devices", get(api::devices::list_devices))
        .route("/api/devices", post(api::devices::add_device))
        .route("/api/devices/ssids", get(api::devices::list_ssids))
        .route("/api/devices/bulk", post(api::devices::bulk_add))
        .route("/api/devices/bulk", delete(api::devices::bulk_delete))
        .route("/api/devices/bulk/status", put(api::devices::bulk_status))
        .route("/api/devices/bulk/group", put(api::devices::bulk_group))
        .route("/api/devices/:id", put(api::devices::update_device))
        .route("/api/devices/:id", delete(api::devices::delete_device))
        .route("/api/devices/:id/status", put(api::devices::set_status))
        .route("/api/devices/:id/policy", get(api::devices::device_policy))
        // Access points
        .route("/api/access-points", get(api::access_points::list_access_points))
        .route("/api/access-points", post(api::access_points::add_access_point))
        .route("/api/access-points/:id", put(api::access_points::update_access_point))
        .route("/api/access-points/:id", delete(api::access_points::delete_access_point))
        // Dashboard
        .route("/api/dashboard/stats", get(api::dashboard::stats))
        .route("/api/dashboard/status", get(api::dashboard::status))
        .route("/api/dashboard/online-users", get(api::dashboard::online_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    // Serve static frontend (production)
    let frontend = Path::new(&state.config.frontend_dir);
    let spa = ServeDir::new(frontend).not_found_service(ServeFile::new(frontend.join("index.html")));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback_service(spa)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub async fn test_state_with(config: Config) -> Arc<AppState> {
    Arc::new(AppState::new(db::test_pool().await, config))
}

#[cfg(test)]
pub async fn test_state() -> Arc<AppState> {
    test_state_with(Config::for_tests()).await
}
