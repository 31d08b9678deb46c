use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{PaymentIntent, PaymentMethod};

/// Append-only audit row for one outbound creation call to the gateway.
/// Never updated after the write; the correlation id is generated fresh per
/// attempt and doubles as the idempotency key offered to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttemptRecord {
    pub id: Uuid,
    pub intent_id: Uuid,
    pub order_id: Uuid,
    pub payer_id: Uuid,
    pub correlation_id: Uuid,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub request_payload: serde_json::Value,
    pub response_payload: Option<serde_json::Value>,
    pub http_status: Option<i32>,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn success(
        intent: &PaymentIntent,
        correlation_id: Uuid,
        request_payload: serde_json::Value,
        response_payload: serde_json::Value,
        http_status: u16,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent_id: intent.id,
            order_id: intent.order_id,
            payer_id: intent.payer_id,
            correlation_id,
            method: intent.method,
            amount_cents: intent.amount_cents,
            request_payload,
            response_payload: Some(response_payload),
            http_status: Some(http_status as i32),
            success: true,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn failure(
        intent: &PaymentIntent,
        correlation_id: Uuid,
        request_payload: serde_json::Value,
        error_message: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent_id: intent.id,
            order_id: intent.order_id,
            payer_id: intent.payer_id,
            correlation_id,
            method: intent.method,
            amount_cents: intent.amount_cents,
            request_payload,
            response_payload: None,
            http_status: None,
            success: false,
            error_message: Some(error_message),
            created_at: Utc::now(),
        }
    }
}
