use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{CreatePaymentRequest, IntentProjection};
use crate::AppState;

/// Create (or idempotently return) the payment intent for an order. The
/// body never carries an authoritative price; the amount is re-derived
/// from the order server-side.
pub async fn create_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CreatePaymentRequest>,
) -> AppResult<Json<IntentProjection>> {
    let projection = state.intent_manager.create_intent(order_id, &request).await?;
    Ok(Json(projection))
}

/// Current intent projection for an order.
pub async fn get_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<IntentProjection>> {
    let projection = state.intent_manager.current_intent(order_id).await?;
    Ok(Json(projection))
}

/// On-demand reconciliation: pull the authoritative status from the
/// gateway and apply it. Safe to call repeatedly.
pub async fn sync_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<IntentProjection>> {
    let projection = state.reconciliation.sync_status(order_id).await?;
    Ok(Json(projection))
}
