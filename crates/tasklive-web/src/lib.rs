//! Tasklive Web Server
//!
//! Axum-based server exposing the realtime event stream, topic viewer
//! registration and the internal notification seam.

pub mod auth;
pub mod routes;
pub mod state;
pub mod stream;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use tasklive_core::config::RealtimeConfig;

use state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/stream", get(stream::stream_handler))
        .route(
            "/topics/{topic}/viewers",
            post(routes::viewers::add_viewer).delete(routes::viewers::remove_viewer),
        );

    let mut internal_routes = Router::new().route("/notify", post(routes::internal::notify));
    if state.config.expose_diagnostics {
        internal_routes = internal_routes
            .route("/diag/users", get(routes::diag::users))
            .route("/diag/topics", get(routes::diag::topics));
    }

    Router::new()
        .nest("/api", api_routes)
        .nest("/internal", internal_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the web server until interrupted.
pub async fn run_server(config: RealtimeConfig, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(config);
    let dispatcher = state.dispatcher.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Web server listening on http://{}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
