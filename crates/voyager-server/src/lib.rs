pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Destinations
        .route(
            "/api/generate-destinations",
            get(routes::destinations::generate_destinations),
        )
        .route(
            "/api/destinations/{id}/viewed",
            post(routes::destinations::mark_viewed),
        )
        // Users
        .route("/api/user", post(routes::users::create_user))
        .route(
            "/api/user/{id}",
            get(routes::users::get_user)
                .patch(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route(
            "/api/user/{id}/saved",
            get(routes::users::list_saved).post(routes::users::save_destination),
        )
        .route(
            "/api/user/{id}/trips",
            get(routes::users::list_trips).post(routes::users::create_trip),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the Voyager backend. `port` overrides `server.port` from the config.
pub async fn serve(root: PathBuf, port: Option<u16>) -> anyhow::Result<()> {
    let port = match port {
        Some(p) => p,
        None => voyager_core::config::Config::load(&root)?.server.port,
    };
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(root, listener).await
}

/// Start the backend on a pre-bound listener.
///
/// Lets the caller read the actual port first when binding to port 0.
pub async fn serve_on(root: PathBuf, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let app_state = AppState::open(root)?;
    let app = build_router(app_state);

    let port = listener.local_addr()?.port();
    tracing::info!("Voyager backend listening on http://localhost:{port}");

    axum::serve(listener, app).await?;
    Ok(())
}
