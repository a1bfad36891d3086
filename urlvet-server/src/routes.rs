use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::handlers::{login, register};
use crate::auth::middleware::auth_middleware;
use crate::handlers::scans::{create_scan, delete_scan, get_scan, list_scans};
use crate::handlers::stats::{health, scan_stats};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let scan_routes = Router::new()
        .route("/", post(create_scan).get(list_scans))
        .route("/{id}", get(get_scan).delete(delete_scan))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/metrics/scans", get(scan_stats))
        .nest("/api/scans", scan_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
