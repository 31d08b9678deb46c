use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use crate::models::GatewayEvent;
use crate::services::WebhookDisposition;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
}

/// Inbound gateway webhook. The contract with the provider: acknowledge
/// fast once the event is authenticated, and keep retries reserved for
/// genuine delivery problems. Business outcomes (unknown intent, already
/// terminal) are 2xx no-ops. Authentication failures are a bare 401 that
/// never explains itself.
pub async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, StatusCode> {
    let event: GatewayEvent =
        serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;

    if !event.is_payment_event() {
        tracing::debug!(topic = ?event.topic, action = ?event.action, "Ignoring non-payment event");
        return Ok(Json(WebhookResponse { success: true }));
    }

    let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());
    let request_id = headers.get("x-request-id").and_then(|v| v.to_str().ok());

    if let Err(e) = state.webhook_processor.authenticate(&event, request_id, signature) {
        tracing::warn!("Dropping unauthenticated webhook: {}", e);
        return Err(StatusCode::UNAUTHORIZED);
    }

    // Acknowledge within the gateway's delivery window; the reconcile work
    // (gateway fetch + transition) runs on its own task.
    let processor = state.webhook_processor.clone();
    tokio::spawn(async move {
        match processor.process(&event).await {
            Ok(WebhookDisposition::Applied) => {
                tracing::info!("Webhook applied");
            }
            Ok(disposition) => {
                tracing::debug!(?disposition, "Webhook resolved without a transition");
            }
            Err(e) => {
                // Already acknowledged; the reconciliation sync is the
                // fallback for events lost here.
                tracing::error!("Webhook processing failed: {}", e);
            }
        }
    });

    Ok(Json(WebhookResponse { success: true }))
}
