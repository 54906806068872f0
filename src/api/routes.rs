use crate::api::handlers::{admin, health, jobs, me, summaries};
use crate::api::middleware::{require_admin, require_user};
use crate::api::AppState;
use axum::{
    extract::Request,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::Level;

pub fn create_router(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new().route("/health", get(health::health));

    // Job triggers and user management need the admin role
    let admin_routes = Router::new()
        .route("/api/v1/jobs/daily", post(jobs::run_daily))
        .route("/api/v1/jobs/backfill", post(jobs::run_backfill))
        .route("/api/v1/jobs/monthly", post(jobs::run_monthly))
        .route("/api/v1/admin/users", get(admin::list_users))
        .route("/api/v1/admin/users/{id}", get(admin::get_user))
        .route(
            "/api/v1/admin/users/{id}/metadata",
            patch(admin::update_user_metadata),
        )
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    // Everything below requires a verified bearer token
    let api_routes = Router::new()
        .route("/api/v1/me", get(me::me))
        .route("/api/v1/summaries/daily", get(summaries::get_daily))
        .route("/api/v1/summaries/monthly", get(summaries::get_monthly))
        .merge(admin_routes)
        .route_layer(from_fn_with_state(state.clone(), require_user));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|_request: &Request, _span: &tracing::Span| {
                    tracing::event!(Level::DEBUG, "received request");
                })
                .on_response(
                    |_response: &axum::response::Response,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::INFO, latency = ?latency, "request completed");
                    },
                )
                .on_failure(
                    |_error: tower_http::classify::ServerErrorsFailureClass,
                     _latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::ERROR, "request failed");
                    },
                ),
        )
}
