pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use storefleet_core::Orchestrator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    let app_state = state::AppState::new(orchestrator);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(routes::health))
        // Stores
        .route(
            "/stores",
            get(routes::stores::list_stores).post(routes::stores::create_store),
        )
        .route(
            "/stores/{name}",
            get(routes::stores::get_store).delete(routes::stores::delete_store),
        )
        .route(
            "/stores/{name}/refresh",
            post(routes::stores::refresh_store),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the API server on `0.0.0.0:<port>`.
pub async fn serve(orchestrator: Arc<Orchestrator>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(orchestrator, listener).await
}

/// Start the API server on a pre-bound listener.
///
/// Lets the caller read the actual port first when binding to port 0.
pub async fn serve_on(
    orchestrator: Arc<Orchestrator>,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(orchestrator);

    tracing::info!("storefleet API listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
