//! REX Server - Maintenance Requisition System
//!
//! REST and WebSocket API server for maintenance material requisitions.

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rex_server::{
    api,
    config::{AppConfig, LoggingConfig},
    realtime::{listener::{ChangeListener, PgChangeChannel}, Backoff, ChangeBus},
    repository::Repository,
    services::{redis::RedisService, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging);

    tracing::info!("Starting REX Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let redis_service = RedisService::new(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;

    tracing::info!("Connected to Redis");

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let repository = Repository::new(pool.clone());
    let bus = Arc::new(ChangeBus::new(config.feed.channel_capacity));

    let listener = ChangeListener::new(
        PgChangeChannel::new(pool.clone(), repository.clone()),
        bus.clone(),
        Backoff::new(config.feed.initial_backoff(), config.feed.max_backoff()),
    );
    tokio::spawn(listener.run());

    let services = Services::new(repository, config.auth.clone(), redis_service);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        bus,
        pool,
    };

    let app = create_router(state)?;

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Console output (plain or JSON) plus an optional daily-rolling JSON file.
///
/// The returned guard flushes the file writer and must be held until exit.
fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("rex_server={},tower_http=debug", config.level).into());

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "rex-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if config.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    guard
}

/// Create the application router with all routes
fn create_router(state: AppState) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Sign-in and sign-up are rate limited per peer IP; the config lives
    // for the whole process.
    let governor = GovernorConfigBuilder::default()
        .per_second(state.config.rate_limit.per_second)
        .burst_size(state.config.rate_limit.burst_size)
        .finish()
        .context("Invalid rate limit configuration")?;
    let auth_routes = Router::new()
        .route("/auth/signup", post(api::auth::signup))
        .route("/auth/login", post(api::auth::login))
        .layer(GovernorLayer {
            config: Box::leak(Box::new(governor)),
        });

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Session
        .route("/auth/me", get(api::auth::me))
        .route("/auth/logout", post(api::auth::logout))
        // Requisitions
        .route(
            "/requisitions",
            get(api::requisitions::list_requisitions).post(api::requisitions::create_requisitions),
        )
        .route("/requisitions/history", get(api::requisitions::history))
        .route(
            "/requisitions/:id",
            get(api::requisitions::get_requisition)
                .put(api::requisitions::update_requisition)
                .delete(api::requisitions::delete_requisition),
        )
        // Workflow
        .route("/requisitions/:id/take", post(api::requisitions::take))
        .route("/requisitions/:id/reject", post(api::requisitions::reject))
        .route("/requisitions/:id/status", post(api::requisitions::advance))
        .route("/requisitions/:id/lapse", post(api::requisitions::lapse))
        .route("/requisitions/:id/transfer", post(api::requisitions::transfer))
        .route("/requisitions/:id/complete", post(api::requisitions::complete))
        .route("/requisitions/:id/close", post(api::requisitions::close))
        // Realtime
        .route("/realtime/requisitions", get(api::realtime::requisition_feed))
        // Catalog
        .route("/catalog/lookup", get(api::catalog::lookup))
        .route(
            "/catalog/items",
            get(api::catalog::list_items).post(api::catalog::create_item),
        )
        .route("/catalog/items/import", post(api::catalog::import_items))
        .route("/catalog/items/import/preview", post(api::catalog::import_preview))
        .route(
            "/catalog/items/:id",
            get(api::catalog::get_item)
                .put(api::catalog::update_item)
                .delete(api::catalog::delete_item),
        )
        // Categories
        .route(
            "/categories",
            get(api::categories::list_categories).post(api::categories::create_category),
        )
        .route("/categories/import", post(api::categories::import_categories))
        .route(
            "/categories/:id",
            put(api::categories::rename_category).delete(api::categories::delete_category),
        )
        // Users
        .route("/users", get(api::users::list_users))
        .route("/users/planners", get(api::users::list_planners))
        .route("/users/:id/role", put(api::users::update_role))
        .merge(auth_routes)
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Ok(Router::new().nest("/api/v1", api_v1).merge(openapi).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http().make_span_with(api::request_span::<axum::body::Body>))
            .layer(cors)
            .layer(CompressionLayer::new()),
    ))
}

