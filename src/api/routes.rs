use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use std::time::Duration;

use crate::api::handlers;
use crate::api::middleware::request_logging;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    // Webhook routes (signature verification instead of API key)
    let webhook_routes = Router::new()
        .route("/webhooks/gateway", post(handlers::gateway_webhook));

    // Payment routes
    let payment_routes = Router::new()
        .route(
            "/orders/:order_id/payments",
            post(handlers::create_payment).get(handlers::get_payment),
        )
        .route("/orders/:order_id/payments/sync", post(handlers::sync_payment));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .nest("/api/v1", payment_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}
