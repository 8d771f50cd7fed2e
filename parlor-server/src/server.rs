use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
};

use axum::{Extension, Router, middleware, response::IntoResponse, routing::get, serve};
use axum::http::{HeaderValue, StatusCode, header};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt};

use shared::config::server::{Config, LogFormat};

use crate::{
    app_state::AppState,
    domain::{ChatRoom, IdleSweeper, SystemClock},
    middleware::request_context::{self, RequestIdState},
    routes, tracer,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder once and returns its handle.
pub fn metrics_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn metrics_endpoint(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
}

/// Initializes the tracing subscriber for logging using the provided
/// configuration.
pub fn initialize_tracing(config: &Config) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true);

    if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).init();
    } else {
        fmt_builder.with_ansi(true).init();
    }

    config.logging.level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Constructs the application state: the clock, the room, and the idle
/// sweeper, explicitly wired together (no hidden singletons). The sweeper
/// is created but not yet running; [`run`] starts and stops it.
#[must_use]
pub fn create_app_state(config: Arc<Config>) -> AppState {
    let clock = Arc::new(SystemClock::new());
    let room = Arc::new(ChatRoom::new(clock.clone()));
    let sweeper = IdleSweeper::new(room.clone(), clock.clone(), config.room.idle_limit_secs);
    AppState {
        room,
        clock,
        sweeper,
        config,
    }
}

/// Creates the API router with all route modules.
#[must_use]
pub fn create_api_router() -> Router<AppState> {
    Router::new().merge(routes::chat::create_router_chat())
}

/// Creates the main application router with all middleware and routes.
#[must_use]
pub fn create_app_router(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let request_id_state = RequestIdState::from_config(&state.config);

    Router::new()
        .nest("/api", create_api_router())
        .merge(routes::health::create_health_router())
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(metrics_handle))
        .layer(tracer::create_trace_layer())
        .layer(middleware::from_fn_with_state(
            request_id_state,
            request_context::assign_request_id,
        ))
        .with_state(state)
}

/// Resolves when a shutdown signal is received.
pub async fn create_shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    info!("shutting down...");
}

/// Starts the server, the idle sweeper, and serves until shutdown.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn run(config: Config) -> anyhow::Result<()> {
    initialize_tracing(&config);
    info!("starting server...");

    let metrics_handle = metrics_handle();
    let config = Arc::new(config);

    let state = create_app_state(config.clone());
    let sweeper = state.sweeper.clone();
    let sweeper_task = sweeper.run();

    let app = create_app_router(state, metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);

    serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await?;

    sweeper.shutdown();
    sweeper_task.await?;

    Ok(())
}

#[cfg(test)]
pub(crate) fn create_app_state_for_tests() -> AppState {
    use shared::config::server::Profile;

    create_app_state(Arc::new(Config::default_for_profile(Profile::Test)))
}
