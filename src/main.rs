//! wa-checker server binary.
//!
//! Wires the PostgreSQL adapters, the token service, and the session core
//! together and serves the REST + WebSocket API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wa_checker::adapters::auth::JwtTokenService;
use wa_checker::adapters::engine::MockEngineFactory;
use wa_checker::adapters::http::{app_router, AuthHandlers, HistoryHandlers, SessionHandlers};
use wa_checker::adapters::postgres::{
    PostgresCheckHistoryRepository, PostgresSessionStatusRepository, PostgresUserRepository,
};
use wa_checker::adapters::websocket::WsState;
use wa_checker::application::{CheckPipeline, SessionManager, SubscriberRegistry};
use wa_checker::config::AppConfig;
use wa_checker::ports::{
    CheckHistoryRepository, EngineFactory, SessionStatusRepository, TokenService, UserRepository,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting wa-checker v{} ({:?})",
        env!("CARGO_PKG_VERSION"),
        config.server.environment
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await
        .context("failed to connect to PostgreSQL")?;
    info!("Connected to PostgreSQL");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;
        info!("Migrations applied");
    }

    let users: Arc<dyn UserRepository> = Arc::new(PostgresUserRepository::new(pool.clone()));
    let status: Arc<dyn SessionStatusRepository> =
        Arc::new(PostgresSessionStatusRepository::new(pool.clone()));
    let history: Arc<dyn CheckHistoryRepository> =
        Arc::new(PostgresCheckHistoryRepository::new(pool.clone()));

    let tokens: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(
        &config.auth.jwt_secret,
        config.auth.token_ttl_secs,
        users.clone(),
    ));

    // The real automation backend attaches through the EngineFactory port;
    // until one is configured, sessions run against the in-process stub.
    let engines: Arc<dyn EngineFactory> = Arc::new(MockEngineFactory::new());
    warn!("No external engine configured; using the in-process stub engine");

    let subscribers = Arc::new(SubscriberRegistry::with_default_capacity());
    let sessions = Arc::new(SessionManager::new(
        engines,
        subscribers.clone(),
        status.clone(),
    ));
    let pipeline = Arc::new(CheckPipeline::new(
        sessions.clone(),
        history.clone(),
        subscribers.clone(),
    ));

    let ws_state = WsState {
        sessions: sessions.clone(),
        pipeline,
        subscribers,
        tokens: tokens.clone(),
    };

    let cors = cors_layer(&config);
    let app = app_router(
        AuthHandlers::new(users, tokens.clone()),
        SessionHandlers::new(sessions, status),
        HistoryHandlers::new(history),
        ws_state,
        tokens,
    )
    .layer(TraceLayer::new_for_http())
    .layer(TimeoutLayer::new(Duration::from_secs(
        config.server.request_timeout_secs,
    )))
    .layer(cors);

    let addr = config.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = config.server.cors_origins_list();
    if origins.is_empty() {
        // No explicit origins configured; sensible for local development.
        return CorsLayer::permissive();
    }

    let origins: Vec<http::HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
