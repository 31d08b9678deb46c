use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Request span carrying the fields payment flows are debugged by: the
/// request id (which webhook signature verification also consumes) and
/// the order id when the path addresses one.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        method = %method,
        path = %path,
        request_id = %request_id,
        order_id = order_id_in(&path).map(tracing::field::display),
    );
    let _guard = span.enter();

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis();

    if status.is_server_error() {
        warn!(status = %status.as_u16(), duration_ms = %duration_ms, "Request failed");
    } else if status.is_client_error() {
        warn!(status = %status.as_u16(), duration_ms = %duration_ms, "Request rejected");
    } else {
        info!(status = %status.as_u16(), duration_ms = %duration_ms, "Request completed");
    }

    response
}

/// Order id segment of `/api/v1/orders/:order_id/...` paths.
fn order_id_in(path: &str) -> Option<Uuid> {
    let mut segments = path.split('/').skip_while(|s| *s != "orders");
    segments.next()?;
    segments.next().and_then(|s| Uuid::parse_str(s).ok())
}

/// JSON tracing subscriber; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,payment_intents=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).json())
        .init();
}
