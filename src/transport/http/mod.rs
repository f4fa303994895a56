pub mod auth;
pub mod errors;
pub mod orders;
pub mod payments;

use {
    crate::AppState,
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post, put},
    },
    std::time::Duration,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
};

/// Provider webhooks are typically well under 20 KB.
pub const BODY_LIMIT_BYTES: usize = 64 * 1024;

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/payments/create", post(payments::create_payment_handler))
        .route("/payments/webhook", post(payments::webhook_handler))
        .route(
            "/payments/webhook/{provider}",
            post(payments::provider_webhook_handler),
        )
        .route("/payments/{id}", get(payments::get_payment_handler))
        .route("/orders/{id}", get(orders::get_order_handler))
        .route(
            "/orders/{id}/status",
            put(orders::update_order_status_handler),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
